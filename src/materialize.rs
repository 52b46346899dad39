use crate::apportion::Selection;
use crate::config::FailurePolicy;
use crate::error::BudgetError;
use crate::progress::{MaterializeSummary, ProgressConfig, ProgressReporter};
use log::{debug, info};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct MaterializeOptions {
    pub on_error: FailurePolicy,
    pub progress: ProgressConfig,
}

/// Copies every selected file to `output_dir/<class>/<file name>`.
///
/// Class directories are created as needed and never cleared; files with the
/// same name are overwritten. Copies are not transactional: with
/// `FailurePolicy::Abort` the first failure returns immediately and leaves
/// whatever was already copied in place.
pub fn materialize(
    selection: &Selection,
    output_dir: &Path,
    options: MaterializeOptions,
) -> Result<MaterializeSummary, BudgetError> {
    let total_bytes = selection.total_bytes();
    let mut reporter = ProgressReporter::new("copy", total_bytes, options.progress);

    reporter.log(format!(
        "copying {} files across {} classes",
        selection.total_files(),
        selection.classes.len()
    ));

    let mut copied_files = 0usize;
    let mut failed_files = 0usize;

    for class in &selection.classes {
        reporter.set_stage(format!("class {}", class.class_name));
        let class_dir = output_dir.join(&class.class_name);

        if let Err(source) = fs::create_dir_all(&class_dir) {
            let err = BudgetError::Processing {
                path: class_dir.clone(),
                source,
            };
            match options.on_error {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::Skip => {
                    failed_files += class.file_count();
                    reporter.warn(format!("{} (skipping class)", err));
                    continue;
                }
            }
        }

        for file in &class.files {
            let dest = class_dir.join(&file.name);
            match fs::copy(&file.path, &dest) {
                Ok(_) => {
                    debug!("copied {:?} -> {:?}", file.path, dest);
                    copied_files += 1;
                    reporter.inc_bytes(file.size);
                }
                Err(source) => {
                    let err = BudgetError::Processing {
                        path: file.path.clone(),
                        source,
                    };
                    match options.on_error {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Skip => {
                            failed_files += 1;
                            reporter.warn(err.to_string());
                        }
                    }
                }
            }
        }
    }

    info!(
        "materialized {} files into {:?} ({} failed)",
        copied_files, output_dir, failed_files
    );
    let outcome = reporter.finish(format!("{} files copied", copied_files));

    Ok(MaterializeSummary {
        output_dir: output_dir.to_path_buf(),
        total_bytes,
        copied_bytes: outcome.processed_bytes,
        copied_files,
        failed_files,
        class_count: selection.classes.len(),
        elapsed: outcome.elapsed,
        avg_bytes_per_sec: outcome.avg_bytes_per_sec,
        warning_count: outcome.warning_count,
        warnings: outcome.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apportion::ClassSelection;
    use crate::config::Policy;
    use crate::manifest::FileEntry;
    use crate::progress::ProgressMode;
    use tempfile::TempDir;

    fn quiet(on_error: FailurePolicy) -> MaterializeOptions {
        MaterializeOptions {
            on_error,
            progress: ProgressConfig::new(ProgressMode::Quiet),
        }
    }

    fn selection_of(class_name: &str, files: Vec<FileEntry>) -> Selection {
        let selected_bytes = files.iter().map(|f| f.size).sum();
        Selection {
            policy: Policy::Proportional,
            budget_bytes: 1_000,
            min_images: None,
            classes: vec![ClassSelection {
                class_name: class_name.to_string(),
                allotment: 1_000,
                available_files: files.len(),
                files,
                selected_bytes,
                truncated: false,
            }],
        }
    }

    #[test]
    fn copies_selected_file_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/ants");
        fs::create_dir_all(&src).unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        fs::write(src.join("a.jpg"), &data).unwrap();

        let out = tmp.path().join("out");
        let selection = selection_of("ants", vec![FileEntry::new(src.join("a.jpg"), 100)]);
        let summary = materialize(&selection, &out, quiet(FailurePolicy::Abort)).unwrap();

        assert_eq!(fs::read(out.join("ants/a.jpg")).unwrap(), data);
        assert_eq!(summary.copied_files, 1);
        assert_eq!(summary.copied_bytes, 100);
        assert_eq!(summary.failed_files, 0);
    }

    #[test]
    fn existing_destination_contents_are_kept_and_same_names_overwritten() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/ants");
        let out = tmp.path().join("out");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(out.join("ants")).unwrap();
        fs::write(src.join("a.jpg"), b"fresh").unwrap();
        fs::write(out.join("ants/a.jpg"), b"stale contents").unwrap();
        fs::write(out.join("ants/old.jpg"), b"old").unwrap();

        let selection = selection_of("ants", vec![FileEntry::new(src.join("a.jpg"), 5)]);
        materialize(&selection, &out, quiet(FailurePolicy::Abort)).unwrap();

        assert_eq!(fs::read(out.join("ants/a.jpg")).unwrap(), b"fresh");
        assert!(out.join("ants/old.jpg").exists());
    }

    #[test]
    fn missing_source_aborts_or_skips_per_policy() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/ants");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.jpg"), b"bb").unwrap();
        let files = vec![
            FileEntry::new(src.join("gone.jpg"), 4),
            FileEntry::new(src.join("b.jpg"), 2),
        ];
        let selection = selection_of("ants", files);

        let out = tmp.path().join("abort");
        let err = materialize(&selection, &out, quiet(FailurePolicy::Abort)).unwrap_err();
        assert!(matches!(err, BudgetError::Processing { .. }));
        assert!(!out.join("ants/b.jpg").exists());

        let out = tmp.path().join("skip");
        let summary = materialize(&selection, &out, quiet(FailurePolicy::Skip)).unwrap();
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.copied_files, 1);
        assert_eq!(summary.warning_count, 1);
        assert!(out.join("ants/b.jpg").exists());
    }
}
