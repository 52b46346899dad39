use crate::error::BudgetError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { name, path, size }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedClass {
    pub name: String,
    pub reason: String,
}

/// Files available per class, one level below the source root.
///
/// Classes are keyed by directory name and iterate in name order; files in a
/// class are sorted by file name. Classes without regular files never appear.
#[derive(Debug, Clone, Default)]
pub struct ClassManifest {
    pub root: PathBuf,
    classes: BTreeMap<String, Vec<FileEntry>>,
    pub skipped: Vec<SkippedClass>,
}

impl ClassManifest {
    pub fn from_classes(root: impl Into<PathBuf>, classes: BTreeMap<String, Vec<FileEntry>>) -> Self {
        let classes = classes
            .into_iter()
            .filter(|(_, files)| !files.is_empty())
            .collect();
        Self {
            root: root.into(),
            classes,
            skipped: Vec::new(),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &[FileEntry])> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[cfg(test)]
    pub fn get(&self, class_name: &str) -> Option<&[FileEntry]> {
        self.classes.get(class_name).map(Vec::as_slice)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.classes.values().map(|files| class_bytes(files)).sum()
    }

    /// Smallest file count across classes, `None` when there are no classes.
    pub fn min_file_count(&self) -> Option<usize> {
        self.classes.values().map(Vec::len).min()
    }
}

pub fn class_bytes(files: &[FileEntry]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

/// Scans `source_dir/<class>/<file>`. Top-level files are ignored, unreadable
/// class directories are recorded in `skipped` and contribute nothing.
pub fn build_manifest(source_dir: &Path) -> Result<ClassManifest, BudgetError> {
    if !source_dir.is_dir() {
        return Err(BudgetError::SourceNotDirectory {
            path: source_dir.to_path_buf(),
        });
    }

    let mut classes = BTreeMap::new();
    let mut skipped = Vec::new();

    let top = WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in top {
        let e = match entry {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                return Err(BudgetError::UnreadableDirectory {
                    path: source_dir.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                warn!("skipping unreadable entry in {:?}: {}", source_dir, err);
                continue;
            }
        };
        if !e.file_type().is_dir() {
            continue;
        }

        let class_name = e.file_name().to_string_lossy().to_string();
        record_class(&mut classes, &mut skipped, class_name, scan_class(e.path()));
    }

    let mut manifest = ClassManifest::from_classes(source_dir, classes);
    manifest.skipped = skipped;
    Ok(manifest)
}

/// Files the outcome of one class scan. Empty classes are dropped; a failed
/// scan becomes a `SkippedClass` and the rest of the manifest is unaffected.
fn record_class(
    classes: &mut BTreeMap<String, Vec<FileEntry>>,
    skipped: &mut Vec<SkippedClass>,
    class_name: String,
    scanned: Result<Vec<FileEntry>, BudgetError>,
) {
    match scanned {
        Ok(files) if files.is_empty() => {
            debug!("class {} has no files, excluded", class_name);
        }
        Ok(files) => {
            debug!("class {}: {} files", class_name, files.len());
            classes.insert(class_name, files);
        }
        Err(err) => {
            // Reported to the user by the caller from `ClassManifest::skipped`.
            debug!("class {} skipped: {}", class_name, err);
            skipped.push(SkippedClass {
                name: class_name,
                reason: err.to_string(),
            });
        }
    }
}

fn scan_class(class_dir: &Path) -> Result<Vec<FileEntry>, BudgetError> {
    let mut files = vec![];
    let walker = WalkDir::new(class_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let e = match entry {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                return Err(BudgetError::UnreadableDirectory {
                    path: class_dir.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                warn!("skipping entry in {:?}: {}", class_dir, err);
                continue;
            }
        };
        if !e.file_type().is_file() {
            continue;
        }
        match e.metadata() {
            Ok(meta) => files.push(FileEntry::new(e.path(), meta.len())),
            Err(err) => warn!("skipping {:?}: {}", e.path(), err),
        }
    }
    Ok(files)
}
