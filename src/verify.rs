use crate::progress::{average_rate, VerifySummary};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Checks that every `output/<class>/<file>` has a same-sized counterpart in
/// `source/<class>/<file>`. Only the first two levels of the output are read.
pub fn verify_output(source_dir: &Path, output_dir: &Path) -> Result<VerifySummary> {
    if !output_dir.is_dir() {
        bail!("output {:?} is not a directory", output_dir);
    }
    let started = Instant::now();
    let mut checked_classes = 0usize;
    let mut checked_files = 0usize;
    let mut checked_bytes = 0u64;

    for entry in WalkDir::new(output_dir).min_depth(1).max_depth(2).sort_by_file_name() {
        let e = entry?;
        let dst = e.path();
        let rel = dst.strip_prefix(output_dir)?;
        let src = source_dir.join(rel);

        if e.depth() == 1 {
            if e.file_type().is_dir() {
                if !src.is_dir() {
                    bail!("class {:?} has no source directory {:?}", rel, src);
                }
                checked_classes += 1;
            }
            continue;
        }

        if !e.file_type().is_file() {
            continue;
        }
        let s1 = std::fs::metadata(&src)
            .with_context(|| format!("missing source file: {:?}", src))?
            .len();
        let s2 = e.metadata()?.len();
        if s1 != s2 {
            bail!("size mismatch for {:?}: source {} vs output {}", rel, s1, s2);
        }
        checked_files += 1;
        checked_bytes = checked_bytes.saturating_add(s2);
    }

    let elapsed = started.elapsed();
    Ok(VerifySummary {
        checked_classes,
        checked_files,
        checked_bytes,
        elapsed,
        avg_bytes_per_sec: average_rate(checked_bytes, elapsed),
    })
}
