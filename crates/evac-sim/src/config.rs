//! Simulation configuration.
//!
//! Everything is plain data with serde support, so a run can be described
//! by a JSON file. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Coefficients of the attraction weight.
///
/// `k_s` scales the pull of the floor field. `k_d`, `k_o` and `k_w` are
/// multiplicative discounts in `[0, 1]` for diagonal steps, cells held by
/// someone else and steps against the current orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationParams {
    pub k_s: f64,
    pub k_d: f64,
    pub k_o: f64,
    pub k_w: f64,
    /// Extra field pull gained at `discipline_radius` from the reference leader
    pub discipline: f64,
    pub discipline_radius: f64,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self::follower()
    }
}

impl NavigationParams {
    /// Solitary agents and pairs.
    #[must_use]
    pub fn follower() -> Self {
        Self {
            k_s: 3.0,
            k_d: 0.3,
            k_o: 0.9,
            k_w: 0.4,
            discipline: 1.0,
            discipline_radius: 10.0,
        }
    }

    /// Physical leader: strongly goal driven, barely deterred by the crowd.
    #[must_use]
    pub fn leader() -> Self {
        Self {
            k_s: 5.0,
            k_o: 0.1,
            discipline: 0.0,
            ..Self::follower()
        }
    }

    /// Virtual leader: ignores occupancy entirely.
    #[must_use]
    pub fn virtual_leader() -> Self {
        Self {
            k_s: 10.0,
            k_o: 0.0,
            k_w: 0.0,
            discipline: 0.0,
            ..Self::follower()
        }
    }

    fn validate(&self, which: &str) -> Result<()> {
        if !(self.k_s.is_finite() && self.k_s >= 0.0) {
            return Err(Error::InvalidConfig(format!("{which}.k_s must be finite and >= 0")));
        }
        for (name, k) in [("k_d", self.k_d), ("k_o", self.k_o), ("k_w", self.k_w)] {
            if !(0.0..=1.0).contains(&k) {
                return Err(Error::InvalidConfig(format!("{which}.{name} must lie in [0, 1]")));
            }
        }
        if !(self.discipline.is_finite() && self.discipline >= 0.0) {
            return Err(Error::InvalidConfig(format!("{which}.discipline must be >= 0")));
        }
        if !(self.discipline_radius.is_finite() && self.discipline_radius > 0.0) {
            return Err(Error::InvalidConfig(format!("{which}.discipline_radius must be > 0")));
        }
        Ok(())
    }
}

/// Feedback controller for the physical leader's step duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedControl {
    /// Fastest allowed duration, in ticks
    pub min_duration: u32,
    /// Slowest allowed duration, in ticks
    pub max_duration: u32,
    /// Change applied per decision
    pub step: u32,
    /// Gap to the last agent at or below which the leader speeds up
    pub cohesion_gap: f64,
}

impl Default for SpeedControl {
    fn default() -> Self {
        Self {
            min_duration: 1,
            max_duration: 4,
            step: 1,
            cohesion_gap: 4.0,
        }
    }
}

/// Pace-setting leader that never occupies a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualLeaderConfig {
    /// Retarget followers to the virtual leader when one is spawned
    pub enabled: bool,
    /// Hold position while the last agent is farther than this
    pub max_gap: f64,
    pub navigation: NavigationParams,
}

impl Default for VirtualLeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_gap: 6.0,
            navigation: NavigationParams::virtual_leader(),
        }
    }
}

/// How gathering areas shape navigation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaGoalConfig {
    /// Scale of the field outside the active area; the inside is levelled
    pub booster: Option<f64>,
    /// Cycle the focus over the area's center and corners as it fills
    pub rotate_focus: bool,
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the run's random source
    pub seed: u64,
    /// Nominal step duration of followers, in ticks
    pub agent_duration: u32,
    /// Initial step duration of the physical leader, in ticks
    pub leader_duration: u32,
    /// Pairs split, and agents stop pairing, this close to the exit
    pub split_distance: f64,
    /// Bond neighbouring solitary agents into pairs every tick
    pub pairing: bool,
    /// Keep a [`SimEvent`](crate::SimEvent) timeline
    pub record_events: bool,
    pub follower: NavigationParams,
    pub leader: NavigationParams,
    pub speed: SpeedControl,
    pub virtual_leader: VirtualLeaderConfig,
    pub areas: AreaGoalConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agent_duration: 3,
            leader_duration: 2,
            split_distance: 2.0,
            pairing: true,
            record_events: true,
            follower: NavigationParams::follower(),
            leader: NavigationParams::leader(),
            speed: SpeedControl::default(),
            virtual_leader: VirtualLeaderConfig::default(),
            areas: AreaGoalConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a JSON config and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_agent_duration(mut self, ticks: u32) -> Self {
        self.agent_duration = ticks;
        self
    }

    #[must_use]
    pub fn with_leader_duration(mut self, ticks: u32) -> Self {
        self.leader_duration = ticks;
        self
    }

    #[must_use]
    pub fn with_split_distance(mut self, distance: f64) -> Self {
        self.split_distance = distance;
        self
    }

    /// Enable or disable automatic pair formation.
    #[must_use]
    pub fn with_pairing(mut self, enabled: bool) -> Self {
        self.pairing = enabled;
        self
    }

    #[must_use]
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.record_events = enabled;
        self
    }

    #[must_use]
    pub fn with_follower_navigation(mut self, params: NavigationParams) -> Self {
        self.follower = params;
        self
    }

    #[must_use]
    pub fn with_leader_navigation(mut self, params: NavigationParams) -> Self {
        self.leader = params;
        self
    }

    #[must_use]
    pub fn with_speed_control(mut self, speed: SpeedControl) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_virtual_leader(mut self, virtual_leader: VirtualLeaderConfig) -> Self {
        self.virtual_leader = virtual_leader;
        self
    }

    #[must_use]
    pub fn with_area_goals(mut self, areas: AreaGoalConfig) -> Self {
        self.areas = areas;
        self
    }

    /// Reject settings the model cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent_duration == 0 || self.leader_duration == 0 {
            return Err(Error::InvalidConfig("durations must be at least one tick".into()));
        }
        if !(self.split_distance.is_finite() && self.split_distance >= 0.0) {
            return Err(Error::InvalidConfig("split_distance must be finite and >= 0".into()));
        }
        let speed = &self.speed;
        if speed.min_duration == 0 || speed.min_duration > speed.max_duration {
            return Err(Error::InvalidConfig(
                "speed needs 0 < min_duration <= max_duration".into(),
            ));
        }
        if !(speed.cohesion_gap.is_finite() && speed.cohesion_gap >= 0.0) {
            return Err(Error::InvalidConfig("speed.cohesion_gap must be >= 0".into()));
        }
        if !(self.virtual_leader.max_gap.is_finite() && self.virtual_leader.max_gap > 0.0) {
            return Err(Error::InvalidConfig("virtual_leader.max_gap must be > 0".into()));
        }
        if let Some(booster) = self.areas.booster {
            if !(booster.is_finite() && booster > 0.0) {
                return Err(Error::InvalidConfig("areas.booster must be finite and > 0".into()));
            }
        }
        self.follower.validate("follower")?;
        self.leader.validate("leader")?;
        self.virtual_leader.navigation.validate("virtual_leader.navigation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn builders_override_fields() {
        let config = SimulationConfig::default()
            .with_seed(7)
            .with_pairing(false)
            .with_split_distance(3.5)
            .with_agent_duration(2);
        assert_eq!(config.seed, 7);
        assert!(!config.pairing);
        assert_eq!(config.split_distance, 3.5);
        assert_eq!(config.agent_duration, 2);
    }

    #[test]
    fn json_partial_config_uses_defaults() {
        let config = SimulationConfig::from_json_str(r#"{ "seed": 9, "follower": { "k_s": 2.0 } }"#)
            .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.follower.k_s, 2.0);
        assert_eq!(config.follower.k_o, NavigationParams::follower().k_o);
        assert_eq!(config.speed, SpeedControl::default());
    }

    #[test]
    fn json_round_trip() {
        let config = SimulationConfig::default().with_seed(123);
        let json = config.to_json_string().unwrap();
        assert_eq!(SimulationConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = SimulationConfig::from_json_str("{ seed: }").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn out_of_range_penalty_is_rejected() {
        let mut nav = NavigationParams::follower();
        nav.k_o = 1.5;
        let err = SimulationConfig::default()
            .with_follower_navigation(nav)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("follower.k_o")));
    }

    #[test]
    fn inverted_speed_bounds_are_rejected() {
        let speed = SpeedControl {
            min_duration: 5,
            max_duration: 2,
            ..SpeedControl::default()
        };
        assert!(SimulationConfig::default()
            .with_speed_control(speed)
            .validate()
            .is_err());
    }

    #[test]
    fn area_options_load_from_json() {
        let config = SimulationConfig::from_json_str(
            r#"{ "areas": { "booster": 5.0, "rotate_focus": true } }"#,
        )
        .unwrap();
        assert_eq!(config.areas.booster, Some(5.0));
        assert!(config.areas.rotate_focus);
        assert_eq!(SimulationConfig::default().areas, AreaGoalConfig::default());

        let err = SimulationConfig::from_json_str(r#"{ "areas": { "booster": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("booster")));
    }
}
