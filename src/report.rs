use crate::apportion::Selection;
use crate::config::{bytes_to_mb, Policy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionReport {
    pub version: u16,
    pub source_dir: String,
    pub output_dir: String,
    pub seed: Option<u64>,
    pub dry_run: bool,
    pub total_selected_bytes: u64,
    pub selection: Selection,
}

impl SelectionReport {
    pub fn new(
        selection: &Selection,
        source_dir: &Path,
        output_dir: &Path,
        seed: Option<u64>,
        dry_run: bool,
    ) -> Self {
        Self {
            version: 1,
            source_dir: source_dir.display().to_string(),
            output_dir: output_dir.display().to_string(),
            seed,
            dry_run,
            total_selected_bytes: selection.total_bytes(),
            selection: selection.clone(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create report directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        fs::write(path, json).with_context(|| format!("failed to write report {:?}", path))?;
        Ok(())
    }
}

/// Console summary: total and per-class size in MB, plus counts for the equal policy.
pub fn summary_lines(selection: &Selection) -> Vec<String> {
    let mut lines = Vec::with_capacity(selection.classes.len() + 1);
    lines.push(format!("Total size: {} MB", mb2(selection.total_bytes())));
    for class in &selection.classes {
        match selection.policy {
            Policy::Proportional => {
                lines.push(format!("  {}: {} MB", class.class_name, mb2(class.selected_bytes)))
            }
            Policy::Equal => lines.push(format!(
                "  {}: {} MB, {} images",
                class.class_name,
                mb2(class.selected_bytes),
                class.file_count()
            )),
        }
    }
    lines
}

fn mb2(bytes: u64) -> String {
    format!("{:.2}", bytes_to_mb(bytes))
}
