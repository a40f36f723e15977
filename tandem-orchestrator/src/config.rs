//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator including the
//! bind address, release pacing, health check tuning and pool naming.

use std::time::Duration;

use tandem_core::domain::deployment::{DEFAULT_TRAFFIC_STEPS, normalize_traffic_steps};
use tandem_core::domain::pool::{PoolLabel, target_group_name};

/// Orchestrator configuration
///
/// All intervals are configurable so the same binary can pace a production
/// cutover over minutes or a staging cutover over seconds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Project name used to derive target group names
    pub project: String,

    /// Environment name used to derive target group names
    pub env: String,

    /// Pool that carries all traffic when the orchestrator starts
    pub initial_active: PoolLabel,

    /// Default traffic steps for deployments that do not specify any
    pub traffic_steps: Vec<u8>,

    /// Default pause after each traffic step
    pub evaluation_interval: Duration,

    /// Default grace period before the previous pool is torn down
    pub termination_wait: Duration,

    /// How often health is polled while a deployment is in flight
    pub health_poll_interval: Duration,

    /// Retries for a transient health check error before it counts as unhealthy
    pub health_retries: u32,

    /// Pause between transient health check retries
    pub health_retry_delay: Duration,

    /// Per-request timeout of the HTTP health probe
    pub health_timeout: Duration,

    /// Health endpoint of the blue pool, enables the HTTP probe together with `green_health_url`
    pub blue_health_url: Option<String>,

    /// Health endpoint of the green pool
    pub green_health_url: Option<String>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(project: String, env: String) -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            project,
            env,
            initial_active: PoolLabel::Blue,
            traffic_steps: DEFAULT_TRAFFIC_STEPS.to_vec(),
            evaluation_interval: Duration::from_secs(60),
            termination_wait: Duration::from_secs(300), // 5 minutes
            health_poll_interval: Duration::from_secs(5),
            health_retries: 3,
            health_retry_delay: Duration::from_millis(500),
            health_timeout: Duration::from_secs(2),
            blue_health_url: None,
            green_health_url: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized variables (all optional):
    /// - TANDEM_BIND_ADDR (default: 0.0.0.0:8080)
    /// - TANDEM_PROJECT, TANDEM_ENV (default: tandem, dev)
    /// - TANDEM_ACTIVE_POOL (blue or green, default: blue)
    /// - TANDEM_TRAFFIC_STEPS (comma separated, default: 10,50,100)
    /// - TANDEM_EVALUATION_INTERVAL (seconds, default: 60)
    /// - TANDEM_TERMINATION_WAIT (seconds, default: 300)
    /// - TANDEM_HEALTH_POLL_INTERVAL (seconds, default: 5)
    /// - TANDEM_HEALTH_RETRIES (default: 3)
    /// - TANDEM_HEALTH_RETRY_DELAY (milliseconds, default: 500)
    /// - TANDEM_HEALTH_TIMEOUT (seconds, default: 2)
    /// - TANDEM_BLUE_HEALTH_URL, TANDEM_GREEN_HEALTH_URL
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            lookup("TANDEM_PROJECT").unwrap_or_else(|| "tandem".to_string()),
            lookup("TANDEM_ENV").unwrap_or_else(|| "dev".to_string()),
        );

        if let Some(addr) = lookup("TANDEM_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(pool) = lookup("TANDEM_ACTIVE_POOL") {
            config.initial_active = pool
                .parse()
                .map_err(|e: String| anyhow::anyhow!("TANDEM_ACTIVE_POOL: {}", e))?;
        }

        if let Some(steps) = lookup("TANDEM_TRAFFIC_STEPS") {
            config.traffic_steps = parse_steps(&steps)?;
        }

        let secs = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        if let Some(interval) = secs("TANDEM_EVALUATION_INTERVAL") {
            config.evaluation_interval = interval;
        }
        if let Some(wait) = secs("TANDEM_TERMINATION_WAIT") {
            config.termination_wait = wait;
        }
        if let Some(interval) = secs("TANDEM_HEALTH_POLL_INTERVAL") {
            config.health_poll_interval = interval;
        }
        if let Some(timeout) = secs("TANDEM_HEALTH_TIMEOUT") {
            config.health_timeout = timeout;
        }

        if let Some(retries) = lookup("TANDEM_HEALTH_RETRIES").and_then(|s| s.parse().ok()) {
            config.health_retries = retries;
        }

        if let Some(delay) = lookup("TANDEM_HEALTH_RETRY_DELAY").and_then(|s| s.parse().ok()) {
            config.health_retry_delay = Duration::from_millis(delay);
        }

        config.blue_health_url = lookup("TANDEM_BLUE_HEALTH_URL");
        config.green_health_url = lookup("TANDEM_GREEN_HEALTH_URL");

        Ok(config)
    }

    /// Target group name for a pool
    pub fn target_group(&self, label: PoolLabel) -> String {
        target_group_name(&self.project, &self.env, label)
    }

    /// Health URLs for both pools, when the HTTP probe is configured
    pub fn health_urls(&self) -> Option<(String, String)> {
        match (&self.blue_health_url, &self.green_health_url) {
            (Some(blue), Some(green)) => Some((blue.clone(), green.clone())),
            _ => None,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.project.is_empty() || self.env.is_empty() {
            anyhow::bail!("project and env cannot be empty");
        }

        normalize_traffic_steps(&self.traffic_steps).map_err(|e| anyhow::anyhow!(e))?;

        if self.health_poll_interval.is_zero() {
            anyhow::bail!("health_poll_interval must be greater than 0");
        }

        if self.blue_health_url.is_some() != self.green_health_url.is_some() {
            anyhow::bail!("blue and green health URLs must be set together");
        }

        for url in [&self.blue_health_url, &self.green_health_url]
            .into_iter()
            .flatten()
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("health URL '{}' must start with http:// or https://", url);
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("tandem".to_string(), "dev".to_string())
    }
}

/// Parses a comma separated list of traffic steps
pub fn parse_steps(input: &str) -> anyhow::Result<Vec<u8>> {
    let steps = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u8>()
                .map_err(|_| anyhow::anyhow!("invalid traffic step '{}'", s))
        })
        .collect::<anyhow::Result<Vec<u8>>>()?;

    normalize_traffic_steps(&steps).map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.traffic_steps, vec![10, 50, 100]);
        assert_eq!(config.termination_wait, Duration::from_secs(300));
        assert_eq!(config.health_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TANDEM_PROJECT", "shop"),
            ("TANDEM_ENV", "prod"),
            ("TANDEM_ACTIVE_POOL", "green"),
            ("TANDEM_TRAFFIC_STEPS", "20, 60"),
            ("TANDEM_EVALUATION_INTERVAL", "15"),
            ("TANDEM_HEALTH_RETRY_DELAY", "250"),
        ]))
        .unwrap();

        assert_eq!(config.initial_active, PoolLabel::Green);
        assert_eq!(config.traffic_steps, vec![20, 60, 100]);
        assert_eq!(config.evaluation_interval, Duration::from_secs(15));
        assert_eq!(config.health_retry_delay, Duration::from_millis(250));
        assert_eq!(config.target_group(PoolLabel::Blue), "shop-prod-blueTG");
    }

    #[test]
    fn test_from_lookup_rejects_bad_pool() {
        assert!(Config::from_lookup(lookup(&[("TANDEM_ACTIVE_POOL", "red")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.blue_health_url = Some("http://blue.internal/".to_string());
        assert!(config.validate().is_err());

        config.green_health_url = Some("green.internal".to_string());
        assert!(config.validate().is_err());

        config.green_health_url = Some("http://green.internal/".to_string());
        assert!(config.validate().is_ok());
        assert!(config.health_urls().is_some());

        config.traffic_steps = vec![50, 10];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_steps() {
        assert_eq!(parse_steps("10,50,100").unwrap(), vec![10, 50, 100]);
        assert!(parse_steps("10,abc").is_err());
        assert!(parse_steps("0").is_err());
    }
}
