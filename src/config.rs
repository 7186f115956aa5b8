use std::time::Duration;

pub const DEFAULT_TABLE: &str = "contact_submissions";

/// Ten years; keeps the cutoff well inside chrono's date range.
pub const MAX_LOOKBACK_HOURS: u32 = 87_600;

/// Upper bound on `max_per_run`; also keeps the SQL `LIMIT` inside `i64`.
pub const MAX_PER_RUN_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub table: String,
    pub webhook_url: String,
    pub sweep: SweepSettings,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Where lead submissions live. The REST store wins when both are configured.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Rest { url: String, key: String },
    Postgres { database_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Tunables for a single sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// Only rows created within this many hours are considered.
    pub lookback_hours: u32,
    /// Rows grouped per inner processing chunk.
    pub batch_size: usize,
    /// Hard cap on rows scanned in one run.
    pub max_per_run: usize,
    /// Deadline for each webhook call.
    pub dispatch_timeout: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 72,
            batch_size: 50,
            max_per_run: 200,
            dispatch_timeout: Duration::from_millis(10_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` is this over the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let store = match (
            env.non_empty("LEADSWEEP_STORE_URL"),
            env.non_empty("DATABASE_URL"),
        ) {
            (Some(url), _) => {
                if !is_http_url(&url) {
                    return Err(format!("Invalid LEADSWEEP_STORE_URL: {url} is not an http(s) URL"));
                }
                let key = env.required("LEADSWEEP_STORE_KEY")?;
                StoreConfig::Rest {
                    url: url.trim_end_matches('/').to_string(),
                    key,
                }
            }
            (None, Some(database_url)) => StoreConfig::Postgres { database_url },
            (None, None) => {
                return Err(
                    "Missing required environment variable: LEADSWEEP_STORE_URL (or DATABASE_URL)"
                        .to_string(),
                );
            }
        };

        let table = env.or("LEADSWEEP_TABLE", DEFAULT_TABLE);
        if !is_identifier(&table) {
            return Err(format!("Invalid LEADSWEEP_TABLE: '{table}' is not a plain identifier"));
        }

        let webhook_url = env.required("LEADSWEEP_WEBHOOK_URL")?;
        if !is_http_url(&webhook_url) {
            return Err(format!(
                "Invalid LEADSWEEP_WEBHOOK_URL: {webhook_url} is not an http(s) URL"
            ));
        }

        let defaults = SweepSettings::default();
        let sweep = SweepSettings {
            lookback_hours: env.bounded(
                "LEADSWEEP_LOOKBACK_HOURS",
                defaults.lookback_hours,
                MAX_LOOKBACK_HOURS,
            )?,
            batch_size: env.positive("LEADSWEEP_BATCH_SIZE", defaults.batch_size)?,
            max_per_run: env.bounded(
                "LEADSWEEP_MAX_PER_RUN",
                defaults.max_per_run,
                MAX_PER_RUN_LIMIT,
            )?,
            dispatch_timeout: Duration::from_millis(env.positive(
                "LEADSWEEP_TIMEOUT_MS",
                defaults.dispatch_timeout.as_millis() as u64,
            )?),
        };

        let log_level = env.or("LEADSWEEP_LOG_LEVEL", "info");

        let log_format = match env.or("LEADSWEEP_LOG_FORMAT", "text").as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(format!(
                    "Invalid LEADSWEEP_LOG_FORMAT: '{other}' (expected text or json)"
                ));
            }
        };

        Ok(Config {
            store,
            table,
            webhook_url,
            sweep,
            log_level,
            log_format,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, String> {
        self.non_empty(key)
            .ok_or_else(|| format!("Missing required environment variable: {key}"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.non_empty(key).unwrap_or_else(|| default.to_string())
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T, String>
    where
        T: std::str::FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.non_empty(key) else {
            return Ok(default);
        };
        let value: T = raw
            .parse()
            .map_err(|e| format!("Invalid {key}: {e}"))?;
        if value <= T::default() {
            return Err(format!("Invalid {key}: must be greater than zero"));
        }
        Ok(value)
    }

    fn bounded<T>(&self, key: &str, default: T, max: T) -> Result<T, String>
    where
        T: std::str::FromStr + PartialOrd + Default + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let value = self.positive(key, default)?;
        if value > max {
            return Err(format!("Invalid {key}: must be at most {max}"));
        }
        Ok(value)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
