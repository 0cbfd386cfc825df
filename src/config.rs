//! Process configuration, read once at startup and passed by reference.

use crate::error::ConfigError;
use crate::fetch::FetchPolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str = "https://api.github.com/repos/CSSEGISandData/COVID-19/contents/csse_covid_19_data/csse_covid_19_daily_reports";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_FETCH_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// GitHub token sent on the listing call.
    pub api_token: String,
    pub listing_url: String,
    /// Upper bound on items processed at once.
    pub max_concurrency: usize,
    pub fetch: FetchPolicy,
    /// Per-request timeout for every HTTP call.
    pub http_timeout: Duration,
    pub db_acquire_timeout: Duration,
    /// Cancel the run once this much time has passed.
    pub run_deadline: Option<Duration>,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_concurrency: usize =
            parse_or(&lookup, "MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        // also sizes the database pool, which counts connections in u32
        if max_concurrency == 0 || u32::try_from(max_concurrency).is_err() {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENCY",
                value: max_concurrency.to_string(),
            });
        }

        let attempts: u32 = parse_or(&lookup, "FETCH_ATTEMPTS", DEFAULT_FETCH_ATTEMPTS)?;
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "FETCH_ATTEMPTS",
                value: "0".into(),
            });
        }

        let fetch = FetchPolicy {
            attempts,
            retry_delay: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_RETRY_DELAY_SECS",
                DEFAULT_FETCH_RETRY_DELAY_SECS,
            )?),
            retry_transport: parse_bool_or(&lookup, "FETCH_RETRY_TRANSPORT", false)?,
        };

        Ok(Config {
            database_url: required(&lookup, "DATABASE_URL")?,
            api_token: required(&lookup, "GITHUB_API_TOKEN")?,
            listing_url: non_empty(&lookup, "LISTING_URL")
                .unwrap_or_else(|| DEFAULT_LISTING_URL.to_string()),
            max_concurrency,
            fetch,
            http_timeout: Duration::from_secs(parse_or(
                &lookup,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            db_acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
            )?),
            run_deadline: parse_opt::<u64, _>(&lookup, "RUN_DEADLINE_SECS")?
                .map(Duration::from_secs),
        })
    }
}

// secrets stay out of the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("api_token", &"<redacted>")
            .field("listing_url", &self.listing_url)
            .field("max_concurrency", &self.max_concurrency)
            .field("fetch", &self.fetch)
            .field("http_timeout", &self.http_timeout)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("run_deadline", &self.run_deadline)
            .finish()
    }
}

fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &'static str,
) -> Result<String, ConfigError> {
    non_empty(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parse_opt<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_bool_or<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://etl:pw@localhost/covid"),
        ("GITHUB_API_TOKEN", "ghp_secret"),
    ];

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let cfg = Config::from_lookup(env(&SECRETS)).unwrap();
        assert_eq!(cfg.listing_url, DEFAULT_LISTING_URL);
        assert_eq!(cfg.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(cfg.fetch.attempts, 3);
        assert_eq!(cfg.fetch.retry_delay, Duration::from_secs(5));
        assert!(!cfg.fetch.retry_transport);
        assert_eq!(cfg.run_deadline, None);
    }

    #[test]
    fn missing_token_is_reported_by_name() {
        let err = Config::from_lookup(env(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GITHUB_API_TOKEN")));
    }

    #[test]
    fn blank_database_url_counts_as_missing() {
        let err = Config::from_lookup(env(&[
            ("DATABASE_URL", "  "),
            ("GITHUB_API_TOKEN", "t"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("MAX_CONCURRENCY", "2"),
            ("FETCH_ATTEMPTS", "5"),
            ("FETCH_RETRY_DELAY_SECS", "1"),
            ("FETCH_RETRY_TRANSPORT", "true"),
            ("RUN_DEADLINE_SECS", "3600"),
            ("LISTING_URL", "http://localhost:9999/list"),
        ]);
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(cfg.max_concurrency, 2);
        assert_eq!(cfg.fetch.attempts, 5);
        assert_eq!(cfg.fetch.retry_delay, Duration::from_secs(1));
        assert!(cfg.fetch.retry_transport);
        assert_eq!(cfg.run_deadline, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.listing_url, "http://localhost:9999/list");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("MAX_CONCURRENCY", "0"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MAX_CONCURRENCY",
                ..
            }
        ));
    }

    #[test]
    fn concurrency_beyond_pool_range_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("MAX_CONCURRENCY", "4294967296"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MAX_CONCURRENCY",
                ..
            }
        ));
    }

    #[test]
    fn garbage_number_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("HTTP_TIMEOUT_SECS", "soon"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = Config::from_lookup(env(&SECRETS)).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("ghp_secret"));
        assert!(!dbg.contains("pw@localhost"));
    }
}
