//! Engine configuration
//!
//! Configuration is loaded from environment variables. Unset or unparsable
//! values keep their defaults.

use std::env;
use std::time::Duration;
use tracing::warn;

use crate::geo::RegionBounds;

/// Main engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Presentation API bind address
    pub host: String,
    /// Presentation API port
    pub port: u16,

    /// Local identity and session token
    pub identity: IdentityConfig,

    /// Location stream configuration
    pub stream: StreamConfig,

    /// Routing provider configuration
    pub provider: ProviderConfig,

    /// Region in which the provider may be used
    pub region: RegionBounds,

    /// Local position filter
    pub position: PositionConfig,

    /// Tracked entity housekeeping
    pub tracking: TrackingConfig,

    /// Roster bootstrap configuration
    pub roster: RosterConfig,
}

/// Identity handed over by the session bootstrap
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub user_id: String,
    pub username: String,
    /// Bearer token; without one no stream connection is attempted
    pub token: Option<String>,
}

/// Location stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint
    pub url: String,
    /// Capacity of the outbound publish queue
    pub outbound_buffer: usize,
    /// Reconnection policy after an unexpected drop
    pub reconnect: ReconnectConfig,
}

/// Bounded exponential backoff for stream reconnection
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Attempts per outage; 0 disables reconnection
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Routing provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Routing profile, e.g. `driving-car`
    pub profile: String,
    /// Per-segment timeout
    pub timeout: Duration,
}

/// Local position emission filter
#[derive(Debug, Clone)]
pub struct PositionConfig {
    pub min_distance_m: f64,
    pub min_interval: Duration,
}

/// Tracked entity housekeeping
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Entities silent for longer than this are dropped; `None` keeps them forever
    pub entity_ttl: Option<Duration>,
    /// How often expiry is checked
    pub sweep_interval: Duration,
}

/// Roster bootstrap configuration
#[derive(Debug, Clone, Default)]
pub struct RosterConfig {
    /// Base URL of the user API; `None` skips the roster fetch
    pub api_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            identity: IdentityConfig::default(),
            stream: StreamConfig::default(),
            provider: ProviderConfig::default(),
            region: RegionBounds::india(),
            position: PositionConfig::default(),
            tracking: TrackingConfig::default(),
            roster: RosterConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            username: "You".to_string(),
            token: None,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".to_string(),
            outbound_buffer: 32,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before the given 1-based attempt, doubling up to `max_backoff`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            api_key: String::new(),
            profile: "driving-car".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 10.0,
            min_interval: Duration::from_secs(5),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            entity_ttl: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Presentation API
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var("PORT") {
            config.port = port;
        }

        // Identity
        if let Some(id) = non_empty_var("USER_ID") {
            config.identity.user_id = id;
        }
        if let Some(name) = non_empty_var("USERNAME") {
            config.identity.username = name;
        }
        config.identity.token = non_empty_var("SESSION_TOKEN");

        // Stream
        if let Some(url) = non_empty_var("STREAM_URL") {
            config.stream.url = url;
        }
        if let Some(attempts) = parse_var("STREAM_RECONNECT_ATTEMPTS") {
            config.stream.reconnect.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>("STREAM_RECONNECT_BACKOFF_MS") {
            config.stream.reconnect.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("STREAM_RECONNECT_MAX_BACKOFF_MS") {
            config.stream.reconnect.max_backoff = Duration::from_millis(ms);
        }

        // Provider
        if let Some(url) = non_empty_var("ORS_BASE_URL") {
            config.provider.base_url = url;
        }
        if let Ok(key) = env::var("ORS_API_KEY") {
            config.provider.api_key = key;
        }
        if let Some(profile) = non_empty_var("ORS_PROFILE") {
            config.provider.profile = profile;
        }
        if let Some(ms) = parse_var::<u64>("PROVIDER_TIMEOUT_MS") {
            config.provider.timeout = Duration::from_millis(ms);
        }

        // Region
        let region = &config.region;
        let min_lat = parse_var("REGION_MIN_LAT").unwrap_or(region.min_lat);
        let max_lat = parse_var("REGION_MAX_LAT").unwrap_or(region.max_lat);
        let min_lng = parse_var("REGION_MIN_LNG").unwrap_or(region.min_lng);
        let max_lng = parse_var("REGION_MAX_LNG").unwrap_or(region.max_lng);
        match RegionBounds::new(min_lat, max_lat, min_lng, max_lng) {
            Ok(bounds) => config.region = bounds,
            Err(e) => warn!("Ignoring region override: {}", e),
        }

        // Position filter
        if let Some(meters) = parse_var("POSITION_MIN_DISTANCE_M") {
            config.position.min_distance_m = meters;
        }
        if let Some(ms) = parse_var::<u64>("POSITION_MIN_INTERVAL_MS") {
            config.position.min_interval = Duration::from_millis(ms);
        }

        // Tracking
        if let Some(secs) = parse_var::<u64>("ENTITY_TTL_SECS") {
            config.tracking.entity_ttl = Some(Duration::from_secs(secs));
        }

        // Roster
        config.roster.api_base_url = non_empty_var("API_BASE_URL");

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.region, RegionBounds::india());
        assert_eq!(config.position.min_distance_m, 10.0);
        assert_eq!(config.position.min_interval, Duration::from_secs(5));
        assert_eq!(config.provider.profile, "driving-car");
        assert!(config.identity.token.is_none());
        assert!(config.tracking.entity_ttl.is_none());
    }

    // The only test in the crate that touches these variables
    #[test]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("REGION_MIN_LAT", "10.0");
            std::env::set_var("ENTITY_TTL_SECS", "120");
        }
        let config = Config::from_env();
        assert_eq!(config.region.min_lat, 10.0);
        assert_eq!(config.region.max_lat, RegionBounds::india().max_lat);
        assert_eq!(config.tracking.entity_ttl, Some(Duration::from_secs(120)));

        // An inverted region is rejected and the default kept
        unsafe {
            std::env::set_var("REGION_MIN_LAT", "30.0");
            std::env::set_var("REGION_MAX_LAT", "10.0");
        }
        let config = Config::from_env();
        assert_eq!(config.region, RegionBounds::india());
        assert_eq!(config.tracking.entity_ttl, Some(Duration::from_secs(120)));

        unsafe {
            std::env::remove_var("REGION_MIN_LAT");
            std::env::remove_var("REGION_MAX_LAT");
            std::env::remove_var("ENTITY_TTL_SECS");
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let reconnect = ReconnectConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(700),
        };
        assert_eq!(reconnect.backoff_for(1), Duration::from_millis(100));
        assert_eq!(reconnect.backoff_for(2), Duration::from_millis(200));
        assert_eq!(reconnect.backoff_for(3), Duration::from_millis(400));
        assert_eq!(reconnect.backoff_for(4), Duration::from_millis(700));
        assert_eq!(reconnect.backoff_for(40), Duration::from_millis(700));
    }
}
