//! Pipeline configuration: store locations plus the per-run options the
//! trigger boundary may override.

use crate::error::{EtlError, EtlResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.01;
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Options accepted by a single run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Fraction of each clean table handed to the PII detector, in (0, 1].
    pub sample_fraction: f64,
    /// Number of transform worker threads.
    pub worker_count: usize,
    /// Rows read from the source store per batch.
    pub batch_size: usize,
    /// Run the sampling auditor after loading.
    pub audit_enabled: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            audit_enabled: true,
        }
    }
}

impl RunOptions {
    /// Reject options that cannot describe a run. Called before the run
    /// controller changes state.
    pub fn validate(&self) -> EtlResult<()> {
        if self.worker_count == 0 {
            return Err(EtlError::InvalidConfig("worker_count must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(EtlError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(EtlError::InvalidConfig(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            )));
        }
        Ok(())
    }
}

/// Full configuration for the runner binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub source_db: String,
    pub analytics_db: String,
    pub link_db: String,
    pub run: RunOptions,
    /// Year used for age and tenure. `None` means the current UTC year.
    pub reference_year: Option<i32>,
    /// Seed for audit sampling. `None` seeds from OS entropy.
    pub audit_seed: Option<u64>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_db: "data/credit_union.db".into(),
            analytics_db: "data/analytics.db".into(),
            link_db: "data/member_link.db".into(),
            run: RunOptions::default(),
            reference_year: None,
            audit_seed: None,
        }
    }
}

impl EtlConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EtlConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Small batches and two workers, so tests cross batch and chunk
    /// boundaries with a few hundred rows.
    pub fn default_test() -> Self {
        Self {
            source_db: ":memory:".into(),
            analytics_db: ":memory:".into(),
            link_db: ":memory:".into(),
            run: RunOptions {
                sample_fraction: 0.5,
                worker_count: 2,
                batch_size: 25,
                audit_enabled: true,
            },
            reference_year: Some(2026),
            audit_seed: Some(42),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RunOptions::default().validate().unwrap();
        EtlConfig::default_test().run.validate().unwrap();
    }

    #[test]
    fn test_config_crosses_batch_boundaries() {
        let cfg = EtlConfig::default_test();
        assert_eq!(cfg.run.batch_size, 25);
        assert_eq!(cfg.run.worker_count, 2);
        assert_eq!(cfg.run.sample_fraction, 0.5);
        assert!(cfg.run.audit_enabled);
        assert_eq!(cfg.reference_year, Some(2026));
        assert!(cfg.audit_seed.is_some());
    }

    #[test]
    fn rejects_bad_options() {
        let bad = [
            RunOptions { worker_count: 0, ..RunOptions::default() },
            RunOptions { batch_size: 0, ..RunOptions::default() },
            RunOptions { sample_fraction: 0.0, ..RunOptions::default() },
            RunOptions { sample_fraction: 1.5, ..RunOptions::default() },
            RunOptions { sample_fraction: f64::NAN, ..RunOptions::default() },
        ];
        for opts in bad {
            assert!(
                matches!(opts.validate(), Err(EtlError::InvalidConfig(_))),
                "{opts:?} should be rejected"
            );
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EtlConfig =
            serde_json::from_str(r#"{ "run": { "worker_count": 8 }, "reference_year": 2030 }"#)
                .unwrap();
        assert_eq!(cfg.run.worker_count, 8);
        assert_eq!(cfg.run.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.reference_year, Some(2030));
        assert_eq!(cfg.source_db, "data/credit_union.db");
    }
}
