//! # Protocol Configuration & Constants
//!
//! Every magic number the chain index depends on lives here, together with
//! [`EngineConfig`], the handful of knobs an operator may turn.
//!
//! The constants that define genesis are consensus-critical: two nodes
//! with different genesis blocks are on different networks, full stop.

use std::path::Path;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string of the chain-index protocol.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Difficulty of the genesis block: 2^17.
pub const GENESIS_DIFFICULTY: u64 = 1 << 17;

/// Timestamp of the genesis block. Every real block comes after it.
pub const GENESIS_TIMESTAMP: u64 = 0;

/// Extra data carried by the genesis block. Changing it changes the
/// genesis hash, and with it the network.
pub const GENESIS_EXTRA_DATA: &[u8] = b"strata genesis";

// ---------------------------------------------------------------------------
// Validation & Fork Choice Defaults
// ---------------------------------------------------------------------------

/// Maximum number of uncles a block may reference.
pub const DEFAULT_MAX_UNCLES: usize = 2;

/// Default share of an uncle's difficulty credited to the including branch.
pub const DEFAULT_UNCLE_BONUS_NUMERATOR: u64 = 1;

/// Denominator paired with [`DEFAULT_UNCLE_BONUS_NUMERATOR`].
pub const DEFAULT_UNCLE_BONUS_DENOMINATOR: u64 = 2;

/// Lowest difficulty accepted by the default difficulty policy.
pub const DEFAULT_MIN_DIFFICULTY: u64 = 1;

// ---------------------------------------------------------------------------
// Config Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or checking an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// UncleBonus
// ---------------------------------------------------------------------------

/// Fraction of an uncle's difficulty credited to the branch that includes it.
///
/// The heaviest-branch rule counts uncles as partial work. How much they
/// count is a policy decision, so it is a parameter rather than a constant:
/// `bonus = uncle_difficulty * numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncleBonus {
    pub numerator: u64,
    pub denominator: u64,
}

impl UncleBonus {
    /// A bonus of zero: uncles contribute nothing and the rule degenerates
    /// to plain heaviest chain.
    pub const NONE: Self = Self {
        numerator: 0,
        denominator: 1,
    };

    /// Apply the fraction to an uncle's difficulty.
    pub fn apply(&self, uncle_difficulty: U256) -> U256 {
        if self.numerator == 0 || self.denominator == 0 {
            return U256::zero();
        }
        uncle_difficulty.saturating_mul(U256::from(self.numerator)) / U256::from(self.denominator)
    }
}

impl Default for UncleBonus {
    fn default() -> Self {
        Self {
            numerator: DEFAULT_UNCLE_BONUS_NUMERATOR,
            denominator: DEFAULT_UNCLE_BONUS_DENOMINATOR,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for the chain engine.
///
/// Loaded from JSON by the node binary; every field has a default so a
/// config file only needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum uncles per block. More than this is an invalid uncle set.
    pub max_uncles: usize,

    /// Uncle weight credited by fork choice.
    pub uncle_bonus: UncleBonus,

    /// Lowest difficulty the default difficulty policy accepts.
    pub min_difficulty: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_uncles: DEFAULT_MAX_UNCLES,
            uncle_bonus: UncleBonus::default(),
            min_difficulty: DEFAULT_MIN_DIFFICULTY,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uncle_bonus.denominator == 0 {
            return Err(ConfigError::Invalid(
                "uncle_bonus.denominator must be non-zero".to_string(),
            ));
        }
        if self.uncle_bonus.numerator > self.uncle_bonus.denominator {
            return Err(ConfigError::Invalid(
                "uncle_bonus must not exceed the uncle's own difficulty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_uncles, DEFAULT_MAX_UNCLES);
        assert_eq!(config.uncle_bonus, UncleBonus { numerator: 1, denominator: 2 });
    }

    #[test]
    fn uncle_bonus_applies_fraction() {
        let bonus = UncleBonus { numerator: 1, denominator: 2 };
        assert_eq!(bonus.apply(U256::from(100u64)), U256::from(50u64));
        assert_eq!(UncleBonus::NONE.apply(U256::from(100u64)), U256::zero());
    }

    #[test]
    fn uncle_bonus_saturates_instead_of_overflowing() {
        let bonus = UncleBonus { numerator: 1, denominator: 1 };
        assert_eq!(bonus.apply(U256::MAX), U256::MAX);
    }

    #[test]
    fn zero_denominator_rejected() {
        let config = EngineConfig {
            uncle_bonus: UncleBonus { numerator: 1, denominator: 0 },
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bonus_above_one_rejected() {
        let config = EngineConfig {
            uncle_bonus: UncleBonus { numerator: 3, denominator: 2 },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "max_uncles": 4 }"#).unwrap();
        assert_eq!(config.max_uncles, 4);
        assert_eq!(config.uncle_bonus, UncleBonus::default());
        assert_eq!(config.min_difficulty, DEFAULT_MIN_DIFFICULTY);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "uncle_bonus": { "numerator": 7, "denominator": 8 } }"#)
            .unwrap();

        let config = EngineConfig::load(&path).expect("load config");
        assert_eq!(config.uncle_bonus, UncleBonus { numerator: 7, denominator: 8 });
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = EngineConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn genesis_constants_sanity() {
        assert!(GENESIS_DIFFICULTY >= DEFAULT_MIN_DIFFICULTY);
        assert!(!GENESIS_EXTRA_DATA.is_empty());
    }
}
