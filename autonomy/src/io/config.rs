//! Simulation configuration stored in `autonomy.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "autonomy.toml";

/// Scheduler configuration (TOML).
///
/// Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutonomyConfig {
    /// Fixed updates per simulated second; converts ticks to completion times.
    pub fixed_tick_rate_hz: u32,

    /// Upper bound on ticks a scenario may run when it sets no limit itself.
    pub max_ticks: u64,

    /// Print every lifecycle event of a simulation, not just the summary.
    pub log_transcript: bool,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            fixed_tick_rate_hz: 50,
            max_ticks: 1_000,
            log_transcript: false,
        }
    }
}

impl AutonomyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fixed_tick_rate_hz == 0 {
            return Err(anyhow!("fixed_tick_rate_hz must be > 0"));
        }
        if self.max_ticks == 0 {
            return Err(anyhow!("max_ticks must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutonomyConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutonomyConfig> {
    if !path.exists() {
        let cfg = AutonomyConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutonomyConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutonomyConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AutonomyConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join(CONFIG_FILE);
        let cfg = AutonomyConfig {
            fixed_tick_rate_hz: 30,
            max_ticks: 20,
            log_transcript: true,
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "max_ticks = 12\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_ticks, 12);
        assert_eq!(cfg.fixed_tick_rate_hz, 50);
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "fixed_tick_rate_hz = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{:#}", err).contains("fixed_tick_rate_hz must be > 0"));
    }
}
