use crate::error::BudgetError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// How the byte budget is split across classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "lower")]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Each class gets a share proportional to its on-disk size.
    Proportional,
    /// Each class gets an equal share, then counts are capped to the scarcest class.
    Equal,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Proportional => "proportional",
            Policy::Equal => "equal",
        }
    }
}

/// What to do when a single file cannot be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "lower")]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub target_bytes: u64,
    pub policy: Policy,
    /// None draws the shuffle seed from OS entropy.
    pub seed: Option<u64>,
    pub on_error: FailurePolicy,
}

impl BudgetConfig {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        target_mb: f64,
        policy: Policy,
    ) -> Result<Self, BudgetError> {
        Ok(Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            target_bytes: mb_to_bytes(target_mb)?,
            policy,
            seed: None,
            on_error: FailurePolicy::Abort,
        })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_failure_policy(mut self, on_error: FailurePolicy) -> Self {
        self.on_error = on_error;
        self
    }
}

/// Converts a megabyte budget into whole bytes (MB = 1024²).
pub fn mb_to_bytes(mb: f64) -> Result<u64, BudgetError> {
    if !mb.is_finite() || mb <= 0.0 {
        return Err(BudgetError::InvalidTarget { value: mb });
    }
    Ok((mb * BYTES_PER_MB as f64).floor() as u64)
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megabytes_convert_with_binary_multiplier() {
        assert_eq!(mb_to_bytes(300.0).unwrap(), 300 * 1024 * 1024);
        assert_eq!(mb_to_bytes(0.5).unwrap(), 512 * 1024);
    }

    #[test]
    fn non_positive_targets_are_rejected() {
        assert!(mb_to_bytes(0.0).is_err());
        assert!(mb_to_bytes(-3.0).is_err());
        assert!(mb_to_bytes(f64::NAN).is_err());
        assert!(mb_to_bytes(f64::INFINITY).is_err());
    }

    #[test]
    fn config_defaults_to_abort_and_unseeded() {
        let cfg = BudgetConfig::new("archive", "dataset_limited", 300.0, Policy::Equal).unwrap();
        assert_eq!(cfg.on_error, FailurePolicy::Abort);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.target_bytes, 300 * BYTES_PER_MB);

        let cfg = cfg
            .with_seed(Some(7))
            .with_failure_policy(FailurePolicy::Skip);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.on_error, FailurePolicy::Skip);
    }
}
