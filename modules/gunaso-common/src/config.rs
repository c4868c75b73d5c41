use std::env;
use std::time::Duration;

/// Default dedup radius, in metres of ground distance.
pub const DEFAULT_SIMILARITY_RADIUS_METERS: f64 = 200.0;
/// How long a staged draft waits for the citizen's decision.
pub const DEFAULT_DRAFT_TTL_SECS: u64 = 300;
/// How long a cached ward-admin rating stays valid.
pub const DEFAULT_WARD_RATING_CACHE_TTL_SECS: u64 = 3600;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub similarity_radius_meters: f64,
    pub draft_ttl_secs: u64,
    pub ward_rating_cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing or malformed.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            database_max_connections: parsed_env("DATABASE_MAX_CONNECTIONS", 5),
            similarity_radius_meters: parsed_env(
                "SIMILARITY_RADIUS_METERS",
                DEFAULT_SIMILARITY_RADIUS_METERS,
            ),
            draft_ttl_secs: parsed_env("DRAFT_TTL_SECS", DEFAULT_DRAFT_TTL_SECS),
            ward_rating_cache_ttl_secs: parsed_env(
                "WARD_RATING_CACHE_TTL_SECS",
                DEFAULT_WARD_RATING_CACHE_TTL_SECS,
            ),
        }
    }

    pub fn settings(&self) -> CoreSettings {
        CoreSettings {
            similarity_radius_meters: self.similarity_radius_meters,
            draft_ttl: Duration::from_secs(self.draft_ttl_secs),
            ward_rating_cache_ttl: Duration::from_secs(self.ward_rating_cache_ttl_secs),
        }
    }
}

/// The knobs the complaint core itself needs; everything else is wiring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreSettings {
    pub similarity_radius_meters: f64,
    pub draft_ttl: Duration,
    pub ward_rating_cache_ttl: Duration,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            similarity_radius_meters: DEFAULT_SIMILARITY_RADIUS_METERS,
            draft_ttl: Duration::from_secs(DEFAULT_DRAFT_TTL_SECS),
            ward_rating_cache_ttl: Duration::from_secs(DEFAULT_WARD_RATING_CACHE_TTL_SECS),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this crate touching the environment.
    #[test]
    fn from_env_reads_pool_size_and_defaults_the_rest() {
        env::set_var("DATABASE_URL", "postgres://localhost/gunaso_test");
        env::set_var("DATABASE_MAX_CONNECTIONS", "12");
        env::remove_var("DRAFT_TTL_SECS");

        let config = Config::from_env();
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.settings().draft_ttl, Duration::from_secs(300));

        env::remove_var("DATABASE_MAX_CONNECTIONS");
        assert_eq!(Config::from_env().database_max_connections, 5);
    }
}
