//! Beacon protocol configuration.
//!
//! This module provides:
//! - [`BeaconConfig`] - all protocol parameters in one struct
//! - [`ConfigError`] - validation failures
//!
//! The configuration is `serde`-derived so it round-trips through the node's
//! TOML configuration file.

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors produced by configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The security parameter kappa must be positive.
    #[error("kappa must be positive")]
    ZeroKappa,

    /// A ratio parameter is outside its allowed range.
    #[error("{name} must be in {range}, got {value}")]
    RatioOutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Allowed range, rendered for the message.
        range: &'static str,
        /// The offending value, rendered for the message.
        value: String,
    },

    /// The number of voting rounds must be at least one.
    #[error("rounds must be at least 1")]
    ZeroRounds,

    /// A phase duration is zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    /// Layers-per-epoch must be positive.
    #[error("layers_per_epoch must be positive")]
    ZeroLayersPerEpoch,

    /// The proposal channel capacity must be positive.
    #[error("proposal_chan_capacity must be positive")]
    ZeroChannelCapacity,
}

/// All tunables of the beacon protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Security parameter of the eligibility threshold.
    pub kappa: u64,

    /// Number of voting rounds (K). Round 0 is the proposal phase.
    pub rounds: u32,

    /// Number of layers in one epoch.
    pub layers_per_epoch: u32,

    /// Capacity of the per-epoch incoming-proposal queue; proposals beyond
    /// it are dropped.
    pub proposal_chan_capacity: usize,

    /// Ratio used in the eligibility threshold; must lie in (0, 1).
    pub q: Ratio<u64>,

    /// Ratio of the epoch weight a proposal margin must reach to count as
    /// decided; must lie in (0, 1].
    pub theta: Ratio<u64>,

    /// Delay after the first layer tick of an epoch before the proposal
    /// phase starts, giving other nodes time to reach the same epoch.
    pub wait_after_epoch_start: Duration,

    /// Length of the proposal phase.
    pub proposal_duration: Duration,

    /// Length of the first voting round.
    pub first_voting_round_duration: Duration,

    /// Length of every voting round after the first.
    pub voting_round_duration: Duration,

    /// Extra time per round reserved for the weak-coin exchange.
    pub weak_coin_round_duration: Duration,

    /// How long after the proposal deadline a proposal is still admitted as
    /// potentially valid.
    pub grace_period: Duration,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            kappa: 40,
            rounds: 300,
            layers_per_epoch: 4032,
            proposal_chan_capacity: 1024,
            q: Ratio::new(1, 3),
            theta: Ratio::new(1, 4),
            wait_after_epoch_start: Duration::from_secs(10),
            proposal_duration: Duration::from_secs(2 * 60),
            first_voting_round_duration: Duration::from_secs(60),
            voting_round_duration: Duration::from_secs(30),
            weak_coin_round_duration: Duration::from_secs(30),
            // One voting round: potentially-valid proposals close when the
            // first bit-vector round begins.
            grace_period: Duration::from_secs(30),
        }
    }
}

impl BeaconConfig {
    /// A configuration with short phases for tests.
    pub fn fast() -> Self {
        Self {
            kappa: 40,
            rounds: 2,
            layers_per_epoch: 4,
            proposal_chan_capacity: 100,
            q: Ratio::new(1, 3),
            theta: Ratio::new(1, 2),
            wait_after_epoch_start: Duration::from_millis(10),
            proposal_duration: Duration::from_millis(50),
            first_voting_round_duration: Duration::from_millis(50),
            voting_round_duration: Duration::from_millis(50),
            weak_coin_round_duration: Duration::from_millis(20),
            grace_period: Duration::from_millis(50),
        }
    }

    /// Validate the configuration.
    ///
    /// Checks that all values are within acceptable ranges and that the
    /// configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kappa == 0 {
            return Err(ConfigError::ZeroKappa);
        }
        if *self.q.numer() == 0 || self.q >= Ratio::new(1, 1) {
            return Err(ConfigError::RatioOutOfRange {
                name: "q",
                range: "(0, 1)",
                value: self.q.to_string(),
            });
        }
        if *self.theta.numer() == 0 || self.theta > Ratio::new(1, 1) {
            return Err(ConfigError::RatioOutOfRange {
                name: "theta",
                range: "(0, 1]",
                value: self.theta.to_string(),
            });
        }
        if self.rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.layers_per_epoch == 0 {
            return Err(ConfigError::ZeroLayersPerEpoch);
        }
        for (name, duration) in [
            ("proposal_duration", self.proposal_duration),
            (
                "first_voting_round_duration",
                self.first_voting_round_duration,
            ),
            ("voting_round_duration", self.voting_round_duration),
            ("weak_coin_round_duration", self.weak_coin_round_duration),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if self.proposal_chan_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BeaconConfig::default().validate().unwrap();
        BeaconConfig::fast().validate().unwrap();
    }

    #[test]
    fn rejects_bad_ratios() {
        let mut config = BeaconConfig::default();
        config.q = Ratio::new(1, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { name: "q", .. })
        ));

        let mut config = BeaconConfig::default();
        config.theta = Ratio::new(3, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { name: "theta", .. })
        ));
    }

    #[test]
    fn rejects_zero_rounds() {
        let mut config = BeaconConfig::default();
        config.rounds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRounds)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = BeaconConfig::default();
        let rendered = toml::to_string(&config).unwrap();
        let parsed: BeaconConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.kappa, config.kappa);
        assert_eq!(parsed.q, config.q);
        assert_eq!(parsed.theta, config.theta);
        assert_eq!(parsed.rounds, config.rounds);
        assert_eq!(parsed.proposal_duration, config.proposal_duration);
        parsed.validate().unwrap();
    }
}
