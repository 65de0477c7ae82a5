use crate::analytics::AttendanceCounting;
use crate::time_utils::ReportZone;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataBackend {
    Rest { url: String, api_key: String },
    Postgres { url: String, max_connections: u32 },
}

impl DataBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DataBackend::Rest { .. } => "rest",
            DataBackend::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: DataBackend,
    pub narrative_url: Option<String>,
    pub zone: ReportZone,
    pub counting: AttendanceCounting,
    pub bind_addr: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let backend = match get("DATA_BACKEND").as_deref().unwrap_or("rest") {
            "rest" | "supabase" => DataBackend::Rest {
                url: require("SUPABASE_URL")?,
                api_key: require("SUPABASE_KEY")?,
            },
            "postgres" => DataBackend::Postgres {
                url: require("DATABASE_URL")?,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 5)?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "DATA_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let zone = match get("REPORT_TIMEZONE") {
            Some(raw) => ReportZone::parse(&raw).ok_or(ConfigError::Invalid {
                name: "REPORT_TIMEZONE",
                value: raw,
            })?,
            None => ReportZone::utc(),
        };

        let counting = match get("ATTENDANCE_COUNTING") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "ATTENDANCE_COUNTING",
                value: raw,
            })?,
            None => AttendanceCounting::default(),
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{port}")
        });

        let timeout_secs: u64 = parse_or("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), 20)?;

        Ok(Self {
            backend,
            narrative_url: get("NARRATIVE_URL"),
            zone,
            counting,
            bind_addr,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
