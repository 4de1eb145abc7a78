use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::network::{NetworkPolicy, Reliable, SimulatedNetwork, DEFAULT_FAILURE_RATE, DEFAULT_LATENCY_MS};
use crate::db::Database;

/// Store location and simulated network conditions. Every flag can also come
/// from the environment.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Path to the store file [default: platform data dir]
    #[arg(long = "db", env = "HIRETRACK_DB", global = true)]
    pub db_path: Option<PathBuf>,

    /// Lower bound of the simulated latency, in milliseconds
    #[arg(long, env = "HIRETRACK_LATENCY_MIN_MS", default_value_t = DEFAULT_LATENCY_MS.0, global = true)]
    pub latency_min_ms: u64,

    /// Upper bound of the simulated latency, in milliseconds
    #[arg(long, env = "HIRETRACK_LATENCY_MAX_MS", default_value_t = DEFAULT_LATENCY_MS.1, global = true)]
    pub latency_max_ms: u64,

    /// Probability that a write fails with a simulated server error
    #[arg(long, env = "HIRETRACK_FAILURE_RATE", default_value_t = DEFAULT_FAILURE_RATE, global = true)]
    pub failure_rate: f64,

    /// Disable simulated latency and failures
    #[arg(long, env = "HIRETRACK_OFFLINE", global = true)]
    pub offline: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.latency_min_ms > self.latency_max_ms {
            bail!(
                "latency range is empty: min {}ms > max {}ms",
                self.latency_min_ms,
                self.latency_max_ms
            );
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            bail!("failure rate must be between 0 and 1, got {}", self.failure_rate);
        }
        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Database::default_path(),
        }
    }

    pub fn network(&self) -> Arc<dyn NetworkPolicy> {
        if self.offline {
            Arc::new(Reliable)
        } else {
            Arc::new(SimulatedNetwork::new(
                self.latency_min_ms,
                self.latency_max_ms,
                self.failure_rate,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["hiretrack"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().settings
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = parse(&[
            "--db",
            "/tmp/x.db",
            "--latency-min-ms",
            "5",
            "--latency-max-ms",
            "10",
            "--failure-rate",
            "0.5",
        ]);
        assert_eq!(settings.db_path().unwrap(), PathBuf::from("/tmp/x.db"));
        assert_eq!(settings.latency_min_ms, 5);
        assert_eq!(settings.latency_max_ms, 10);
        assert_eq!(settings.failure_rate, 0.5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut settings = parse(&["--latency-min-ms", "10", "--latency-max-ms", "20"]);
        settings.latency_min_ms = 30;
        assert!(settings.validate().is_err());

        settings.latency_min_ms = 0;
        settings.failure_rate = 1.5;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn test_offline_network_is_instant_and_reliable() {
        let mut settings = parse(&["--failure-rate", "1"]);
        settings.offline = true;
        let network = settings.network();
        assert_eq!(network.latency(), Duration::ZERO);
        assert!(!network.should_fail());
    }
}
