//! Service pool domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label of one of the two interchangeable deployment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolLabel {
    Blue,
    Green,
}

impl PoolLabel {
    /// Both labels, blue first
    pub const ALL: [PoolLabel; 2] = [PoolLabel::Blue, PoolLabel::Green];

    /// The other pool of the pair
    pub fn other(self) -> PoolLabel {
        match self {
            PoolLabel::Blue => PoolLabel::Green,
            PoolLabel::Green => PoolLabel::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoolLabel::Blue => "blue",
            PoolLabel::Green => "green",
        }
    }
}

impl fmt::Display for PoolLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(PoolLabel::Blue),
            "green" => Ok(PoolLabel::Green),
            other => Err(format!("unknown pool '{}': expected blue or green", other)),
        }
    }
}

/// Health of a service pool as last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(HealthStatus::Unknown),
            "healthy" => Ok(HealthStatus::Healthy),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            other => Err(format!("unknown health status '{}'", other)),
        }
    }
}

/// One of the two deployment targets behind the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePool {
    /// Which side of the pair this is
    pub label: PoolLabel,

    /// Target group backing this pool (e.g. "shop-prod-blueTG")
    pub target_group: String,

    /// Share of production traffic, in percent
    pub weight: u8,

    /// Last reported health
    pub health: HealthStatus,

    /// Artifact currently running on the pool, if any
    pub artifact_version: Option<String>,
}

impl ServicePool {
    pub fn new(label: PoolLabel, target_group: impl Into<String>, weight: u8) -> Self {
        Self {
            label,
            target_group: target_group.into(),
            weight,
            health: HealthStatus::Unknown,
            artifact_version: None,
        }
    }

    /// Whether this pool carries all production traffic
    pub fn is_active(&self) -> bool {
        self.weight == 100
    }
}

/// Traffic split across the two pools, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weights {
    pub blue: u8,
    pub green: u8,
}

impl Weights {
    pub fn new(blue: u8, green: u8) -> Self {
        Self { blue, green }
    }

    /// Routes `weight` percent to `label` and the remainder to the other pool
    pub fn routing(label: PoolLabel, weight: u8) -> Self {
        let weight = weight.min(100);
        match label {
            PoolLabel::Blue => Self::new(weight, 100 - weight),
            PoolLabel::Green => Self::new(100 - weight, weight),
        }
    }

    /// Weight routed to `label`
    pub fn of(&self, label: PoolLabel) -> u8 {
        match label {
            PoolLabel::Blue => self.blue,
            PoolLabel::Green => self.green,
        }
    }

    /// Both values in 0..=100 and summing to 100
    pub fn is_valid(&self) -> bool {
        self.blue <= 100 && self.green <= 100 && u16::from(self.blue) + u16::from(self.green) == 100
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blue={} green={}", self.blue, self.green)
    }
}

/// Builds the target group name the way the infrastructure stacks name them
pub fn target_group_name(project: &str, env: &str, label: PoolLabel) -> String {
    format!("{}-{}-{}TG", project, env, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_pool() {
        assert_eq!(PoolLabel::Blue.other(), PoolLabel::Green);
        assert_eq!(PoolLabel::Green.other(), PoolLabel::Blue);
    }

    #[test]
    fn test_pool_label_parse() {
        assert_eq!("Blue".parse::<PoolLabel>(), Ok(PoolLabel::Blue));
        assert_eq!(" green ".parse::<PoolLabel>(), Ok(PoolLabel::Green));
        assert!("red".parse::<PoolLabel>().is_err());
    }

    #[test]
    fn test_health_status_serde() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
        let parsed: HealthStatus = serde_json::from_str("\"healthy\"").unwrap();
        assert_eq!(parsed, HealthStatus::Healthy);
    }

    #[test]
    fn test_weights_routing() {
        assert_eq!(Weights::routing(PoolLabel::Green, 10), Weights::new(90, 10));
        assert_eq!(Weights::routing(PoolLabel::Blue, 100), Weights::new(100, 0));
        assert_eq!(Weights::new(30, 70).of(PoolLabel::Green), 70);
    }

    #[test]
    fn test_weights_validity() {
        assert!(Weights::new(100, 0).is_valid());
        assert!(Weights::new(40, 60).is_valid());
        assert!(!Weights::new(60, 50).is_valid());
        assert!(!Weights::new(200, 156).is_valid());
    }

    #[test]
    fn test_target_group_name() {
        assert_eq!(
            target_group_name("shop", "prod", PoolLabel::Green),
            "shop-prod-greenTG"
        );
    }
}
