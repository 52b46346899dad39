use crate::config::Policy;
use crate::error::BudgetError;
use crate::manifest::{class_bytes, ClassManifest, FileEntry};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSelection {
    pub class_name: String,
    pub allotment: u64,
    pub available_files: usize,
    pub files: Vec<FileEntry>,
    pub selected_bytes: u64,
    /// Set when the equal-count cap shortened the accepted list.
    pub truncated: bool,
}

impl ClassSelection {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub policy: Policy,
    pub budget_bytes: u64,
    /// Count cap applied by the equal policy.
    pub min_images: Option<usize>,
    pub classes: Vec<ClassSelection>,
}

impl Selection {
    pub fn total_bytes(&self) -> u64 {
        self.classes.iter().map(|c| c.selected_bytes).sum()
    }

    pub fn total_files(&self) -> usize {
        self.classes.iter().map(ClassSelection::file_count).sum()
    }

    #[cfg(test)]
    pub fn get(&self, class_name: &str) -> Option<&ClassSelection> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }
}

/// Shuffle source for a run; unseeded runs draw from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

pub fn apportion<R: Rng + ?Sized>(
    manifest: &ClassManifest,
    budget_bytes: u64,
    policy: Policy,
    rng: &mut R,
) -> Result<Selection, BudgetError> {
    match policy {
        Policy::Proportional => proportional(manifest, budget_bytes, rng),
        Policy::Equal => equal_budget(manifest, budget_bytes, rng),
    }
}

fn proportional<R: Rng + ?Sized>(
    manifest: &ClassManifest,
    budget_bytes: u64,
    rng: &mut R,
) -> Result<Selection, BudgetError> {
    let total = manifest.total_bytes();
    if total == 0 {
        return Err(BudgetError::Division {
            denominator: "total source size",
        });
    }

    let mut classes = Vec::with_capacity(manifest.num_classes());
    for (class_name, files) in manifest.classes() {
        // Integer floor matches the real-valued comparison since sizes are whole bytes.
        let allotment = (budget_bytes as u128 * class_bytes(files) as u128 / total as u128) as u64;
        let (accepted, selected_bytes) = greedy_take(files, allotment, rng);
        debug!(
            "{}: allotment={} accepted={} bytes={}",
            class_name,
            allotment,
            accepted.len(),
            selected_bytes
        );
        classes.push(ClassSelection {
            class_name: class_name.to_string(),
            allotment,
            available_files: files.len(),
            files: accepted,
            selected_bytes,
            truncated: false,
        });
    }

    Ok(Selection {
        policy: Policy::Proportional,
        budget_bytes,
        min_images: None,
        classes,
    })
}

fn equal_budget<R: Rng + ?Sized>(
    manifest: &ClassManifest,
    budget_bytes: u64,
    rng: &mut R,
) -> Result<Selection, BudgetError> {
    let num_classes = manifest.num_classes() as u64;
    if num_classes == 0 {
        return Err(BudgetError::Division {
            denominator: "class count",
        });
    }
    let budget_per_class = budget_bytes / num_classes;
    let min_images = manifest.min_file_count().unwrap_or(0);
    info!(
        "equal budget: {} classes, {} bytes each, capped at {} files",
        num_classes, budget_per_class, min_images
    );

    let mut classes = Vec::with_capacity(manifest.num_classes());
    for (class_name, files) in manifest.classes() {
        let (mut accepted, mut selected_bytes) = greedy_take(files, budget_per_class, rng);
        let truncated = accepted.len() > min_images;
        if truncated {
            accepted.truncate(min_images);
            selected_bytes = class_bytes(&accepted);
            debug!("{}: truncated to {} files", class_name, min_images);
        }
        classes.push(ClassSelection {
            class_name: class_name.to_string(),
            allotment: budget_per_class,
            available_files: files.len(),
            files: accepted,
            selected_bytes,
            truncated,
        });
    }

    Ok(Selection {
        policy: Policy::Equal,
        budget_bytes,
        min_images: Some(min_images),
        classes,
    })
}

/// Shuffles a copy of `files` and accepts them in order until the next one
/// would push the running total past `allotment`. Stops at the first miss.
fn greedy_take<R: Rng + ?Sized>(
    files: &[FileEntry],
    allotment: u64,
    rng: &mut R,
) -> (Vec<FileEntry>, u64) {
    let mut shuffled = files.to_vec();
    shuffled.shuffle(rng);

    let mut accepted = Vec::new();
    let mut so_far = 0u64;
    for file in shuffled {
        if so_far.saturating_add(file.size) > allotment {
            break;
        }
        so_far += file.size;
        accepted.push(file);
    }
    (accepted, so_far)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn manifest(classes: Vec<(&str, Vec<u64>)>) -> ClassManifest {
        let mut map = BTreeMap::new();
        for (name, sizes) in classes {
            let files = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| FileEntry::new(format!("src/{name}/{i:03}.jpg"), *size))
                .collect();
            map.insert(name.to_string(), files);
        }
        ClassManifest::from_classes("src", map)
    }

    fn seeded(seed: u64) -> ChaCha8Rng {
        rng_from_seed(Some(seed))
    }

    #[test]
    fn proportional_allotments_follow_class_share() {
        let m = manifest(vec![("ants", vec![100; 30]), ("bees", vec![100; 10])]);
        let sel = apportion(&m, 2_000, Policy::Proportional, &mut seeded(1)).unwrap();

        let ants = sel.get("ants").unwrap();
        let bees = sel.get("bees").unwrap();
        assert_eq!(ants.allotment, 1_500);
        assert_eq!(bees.allotment, 500);
        assert_eq!(ants.file_count(), 15);
        assert_eq!(bees.file_count(), 5);
        assert_eq!(sel.total_bytes(), 2_000);
        assert_eq!(sel.min_images, None);
    }

    #[test]
    fn proportional_never_exceeds_allotment_or_budget() {
        let m = manifest(vec![
            ("ants", vec![37, 512, 91, 1_024, 3, 77, 640]),
            ("bees", vec![250, 250, 999, 12]),
            ("wasps", vec![4_096, 1]),
        ]);
        for seed in 0..50 {
            let sel = apportion(&m, 3_000, Policy::Proportional, &mut seeded(seed)).unwrap();
            for class in &sel.classes {
                assert!(class.selected_bytes <= class.allotment, "seed {seed}: {class:?}");
                assert_eq!(class.selected_bytes, class_bytes(&class.files));
            }
            assert!(sel.total_bytes() <= 3_000);
        }
    }

    #[test]
    fn greedy_stops_at_first_file_over_allotment() {
        let files = vec![
            FileEntry::new("a", 60),
            FileEntry::new("b", 50),
            FileEntry::new("c", 10),
        ];
        let mut rng = seeded(3);
        let (accepted, bytes) = greedy_take(&files, 100, &mut rng);

        let mut order = files.clone();
        order.shuffle(&mut seeded(3));
        let mut expected = Vec::new();
        let mut total = 0;
        for f in order {
            if total + f.size > 100 {
                break;
            }
            total += f.size;
            expected.push(f);
        }
        assert_eq!(accepted, expected);
        assert_eq!(bytes, total);
    }

    #[test]
    fn all_empty_files_fail_proportional_with_division_error() {
        let m = manifest(vec![("ants", vec![0, 0]), ("bees", vec![0])]);
        let err = apportion(&m, 1_000, Policy::Proportional, &mut seeded(0)).unwrap_err();
        assert!(err.is_division());
    }

    #[test]
    fn empty_manifest_fails_both_policies() {
        let m = ClassManifest::default();
        assert!(apportion(&m, 1_000, Policy::Equal, &mut seeded(0))
            .unwrap_err()
            .is_division());
        assert!(apportion(&m, 1_000, Policy::Proportional, &mut seeded(0))
            .unwrap_err()
            .is_division());
    }

    #[test]
    fn zero_size_class_only_takes_empty_files() {
        let m = manifest(vec![("ants", vec![0, 0, 0]), ("bees", vec![100, 100])]);
        let sel = apportion(&m, 1_000, Policy::Proportional, &mut seeded(9)).unwrap();
        let ants = sel.get("ants").unwrap();
        assert_eq!(ants.allotment, 0);
        assert_eq!(ants.file_count(), 3);
        assert_eq!(ants.selected_bytes, 0);
    }

    #[test]
    fn equal_policy_caps_counts_to_scarcest_class() {
        let m = manifest(vec![("ants", vec![10; 10]), ("bees", vec![10; 3])]);
        let sel = apportion(&m, 1_000_000, Policy::Equal, &mut seeded(5)).unwrap();
        assert_eq!(sel.min_images, Some(3));
        assert_eq!(sel.get("ants").unwrap().file_count(), 3);
        assert_eq!(sel.get("bees").unwrap().file_count(), 3);
        assert!(sel.get("ants").unwrap().truncated);
        assert!(!sel.get("bees").unwrap().truncated);
        assert_eq!(sel.get("ants").unwrap().selected_bytes, 30);
    }

    #[test]
    fn equal_policy_respects_per_class_budget() {
        let m = manifest(vec![
            ("ants", vec![300, 200, 100, 400, 50]),
            ("bees", vec![500, 10, 20, 30]),
            ("wasps", vec![1, 2, 3, 4, 5, 6]),
        ]);
        for seed in 0..50 {
            let sel = apportion(&m, 900, Policy::Equal, &mut seeded(seed)).unwrap();
            let min_images = sel.min_images.unwrap();
            assert_eq!(min_images, 4);
            for class in &sel.classes {
                assert_eq!(class.allotment, 300);
                assert!(class.selected_bytes <= 300);
                assert!(class.file_count() <= min_images);
            }
        }
    }

    #[test]
    fn same_seed_gives_identical_selection() {
        let m = manifest(vec![("ants", vec![5, 9, 13, 2, 44, 8, 1]), ("bees", vec![7, 7, 30, 12])]);
        for policy in [Policy::Proportional, Policy::Equal] {
            let a = apportion(&m, 60, policy, &mut seeded(42)).unwrap();
            let b = apportion(&m, 60, policy, &mut seeded(42)).unwrap();
            assert_eq!(a, b);
        }
    }
}
