use std::env;

use chrono::Duration;
use log::*;

const DEFAULT_CM_HOST: &str = "127.0.0.1";
const DEFAULT_CM_PORT: u16 = 8340;
const DEFAULT_OTP_TTL: Duration = Duration::minutes(10);
const DEFAULT_ABANDONMENT_WINDOW: Duration = Duration::hours(48);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Lifetime of an exchange code, fixed at issuance.
    pub otp_ttl: Duration,
    /// How long an idle in-progress reservation survives before the reconciliation job reclaims
    /// it.
    pub abandonment_window: Duration,
    /// How often the reconciliation job runs.
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CM_HOST.to_string(),
            port: DEFAULT_CM_PORT,
            database_url: String::default(),
            otp_ttl: DEFAULT_OTP_TTL,
            abandonment_window: DEFAULT_ABANDONMENT_WINDOW,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("CM_HOST").ok().unwrap_or_else(|| DEFAULT_CM_HOST.into());
        let port = env::var("CM_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for CM_PORT. {e} Using the default, {DEFAULT_CM_PORT}.");
                    DEFAULT_CM_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CM_PORT);
        let database_url = env::var("CM_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CM_DATABASE_URL is not set. Using the default, sqlite://data/market_store.db");
            "sqlite://data/market_store.db".into()
        });
        let otp_ttl = env_duration_secs("CM_OTP_TTL_SECONDS").unwrap_or(DEFAULT_OTP_TTL);
        let abandonment_window = env_duration_secs("CM_ABANDONMENT_SECONDS").unwrap_or(DEFAULT_ABANDONMENT_WINDOW);
        let sweep_interval_secs = env::var("CM_SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for CM_SWEEP_INTERVAL_SECONDS. {e}");
                        e
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        Self { host, port, database_url, otp_ttl, abandonment_window, sweep_interval_secs }
    }
}

fn env_duration_secs(var: &str) -> Option<Duration> {
    let s = env::var(var).ok()?;
    match s.parse::<i64>() {
        Ok(secs) => Some(Duration::seconds(secs)),
        Err(e) => {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default instead.");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8340);
        assert_eq!(config.otp_ttl, Duration::minutes(10));
        assert_eq!(config.abandonment_window, Duration::hours(48));
        assert_eq!(config.sweep_interval_secs, 60);
    }
}
