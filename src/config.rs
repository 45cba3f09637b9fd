//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section carries defaults, so a partial file (or none at all) yields the
//! documented constants.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::odds::market::MarketRule;
use crate::odds::probability::ProbabilityConfig;
use crate::strategy::pools::PoolConfig;
use crate::strategy::premium::PremiumConfig;
use crate::strategy::singles::SinglesConfig;
use crate::strategy::tiers::ParlaysConfig;
use crate::strategy::value::ValueConfig;
use crate::types::EngineError;

/// Overrides the single-pick probability floor.
pub const ENV_SINGLES_PROB_FLOOR: &str = "SINGLES_PROB_FLOOR";
/// Overrides the single-pick value margin.
pub const ENV_SINGLES_VALUE_MARGIN: &str = "SINGLES_VALUE_MARGIN";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub markets: MarketsConfig,
    pub probability: ProbabilityConfig,
    pub value: ValueConfig,
    pub pools: PoolConfig,
    pub singles: SinglesConfig,
    pub parlays: ParlaysConfig,
    pub premium: PremiumConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory holding one sub-directory per cycle day.
    pub data_dir: String,
    /// Flat stake per bet.
    pub stake: f64,
    /// Local hour at which a new cycle day begins.
    pub cutoff_hour: u32,
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            stake: 50.0,
            cutoff_hour: 6,
            utc_offset_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketsConfig {
    /// Classification rules tried before the built-in table.
    pub extra_rules: Vec<MarketRule>,
}

impl AppConfig {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            return Self::load(path);
        }
        warn!(path = %path.display(), "Config file not found, using defaults");
        let mut config = AppConfig::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, ENV_SINGLES_PROB_FLOOR)? {
            debug!(value = v, "Single-pick probability floor overridden");
            self.singles.probability_floor = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_SINGLES_VALUE_MARGIN)? {
            debug!(value = v, "Single-pick value margin overridden");
            self.singles.value_margin = v;
        }
        Ok(())
    }

    /// Reject settings no stage could run with.
    pub fn validate(&self) -> Result<()> {
        if !self.engine.stake.is_finite() || self.engine.stake <= 0.0 {
            return Err(EngineError::Config(format!("stake must be finite and positive, got {}", self.engine.stake)).into());
        }
        if self.engine.cutoff_hour > 23 {
            return Err(EngineError::Config(format!("cutoff_hour out of range: {}", self.engine.cutoff_hour)).into());
        }
        if self.parlays.tiers.is_empty() {
            return Err(EngineError::Config("at least one parlay tier is required".to_string()).into());
        }
        for tier in &self.parlays.tiers {
            if tier.rule.legs < 2 {
                return Err(EngineError::Config(format!("tier {} needs at least 2 legs", tier.name)).into());
            }
        }
        if self.premium.min_quota > self.premium.max_quota {
            return Err(EngineError::Config("premium min_quota exceeds max_quota".to_string()).into());
        }
        Ok(())
    }
}

fn parse_override<F>(lookup: &F, name: &str) -> Result<Option<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| EngineError::Config(format!("{name} is not a number: {raw}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!((cfg.engine.stake - 50.0).abs() < 1e-9);
        assert_eq!(cfg.engine.cutoff_hour, 6);
        assert_eq!(cfg.parlays.tiers.len(), 3);
        assert!(cfg.markets.extra_rules.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [engine]
            stake = 20.0

            [singles]
            target_count = 5
            "#,
        )
        .unwrap();
        assert!((cfg.engine.stake - 20.0).abs() < 1e-9);
        assert_eq!(cfg.engine.data_dir, "data");
        assert_eq!(cfg.singles.target_count, 5);
        assert!((cfg.singles.shrink_weight - 0.35).abs() < 1e-9);
        assert_eq!(cfg.parlays.tiers.len(), 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|name| match name {
            ENV_SINGLES_PROB_FLOOR => Some("0.45".to_string()),
            ENV_SINGLES_VALUE_MARGIN => Some(" ".to_string()),
            _ => None,
        })
        .unwrap();
        assert!((cfg.singles.probability_floor - 0.45).abs() < 1e-9);
        assert!((cfg.singles.value_margin - 0.03).abs() < 1e-9);

        let err = cfg
            .apply_overrides(|name| (name == ENV_SINGLES_VALUE_MARGIN).then(|| "abc".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_SINGLES_VALUE_MARGIN));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut cfg = AppConfig::default();
        cfg.engine.stake = 0.0;
        assert!(cfg.validate().is_err());

        for stake in [f64::NAN, f64::INFINITY] {
            let mut cfg = AppConfig::default();
            cfg.engine.stake = stake;
            assert!(cfg.validate().is_err());
        }

        let parsed: AppConfig = toml::from_str("[engine]\nstake = inf\n").unwrap();
        assert!(parsed.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.parlays.tiers.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_repo_config() {
        // Runs from the crate root under cargo test.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(cfg.engine.stake > 0.0);
            assert_eq!(cfg.parlays.tiers.len(), 3);
        }
    }
}
