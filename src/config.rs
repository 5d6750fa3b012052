use crate::db::MAX_ANSWERS_PER_INSERT;
use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub survey_id: i32,
    pub survey_definition: PathBuf,
    pub insert_chunk_size: usize,
    pub run_migrations: bool,
    pub backfill_mappings: bool,
    pub mapping_refresh_cron: Option<String>,
    pub notification_webhook: Option<String>,
    pub submit_rate_limit: usize,
    pub trust_forwarded_for: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let insert_chunk_size = parse_or(get("PES_INSERT_CHUNK_SIZE"), "PES_INSERT_CHUNK_SIZE", DEFAULT_INSERT_CHUNK_SIZE)?;
        if insert_chunk_size == 0 || insert_chunk_size > MAX_ANSWERS_PER_INSERT {
            return Err(ConfigError::Invalid {
                key: "PES_INSERT_CHUNK_SIZE",
                value: insert_chunk_size.to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
            survey_id: parse_or(get("PES_SURVEY_ID"), "PES_SURVEY_ID", 1)?,
            survey_definition: get("PES_SURVEY_DEFINITION")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("survey/pes.json")),
            insert_chunk_size,
            run_migrations: parse_flag(get("PES_RUN_MIGRATIONS"), "PES_RUN_MIGRATIONS")?,
            backfill_mappings: parse_flag(get("PES_BACKFILL_MAPPINGS"), "PES_BACKFILL_MAPPINGS")?,
            mapping_refresh_cron: get("PES_MAPPING_REFRESH_CRON"),
            notification_webhook: get("PRIVATE_NOTIFICATION_WEBHOOK"),
            submit_rate_limit: parse_or(get("PES_SUBMIT_RATE_LIMIT"), "PES_SUBMIT_RATE_LIMIT", 30)?,
            trust_forwarded_for: parse_flag(get("PES_TRUST_FORWARDED_FOR"), "PES_TRUST_FORWARDED_FOR")?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/pes")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.survey_id, 1);
        assert_eq!(config.insert_chunk_size, DEFAULT_INSERT_CHUNK_SIZE);
        assert_eq!(config.survey_definition, PathBuf::from("survey/pes.json"));
        assert!(!config.run_migrations);
        assert!(!config.trust_forwarded_for);
        assert!(config.notification_webhook.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let err = config_from(&[("PORT", "8080")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_port_and_flags() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/pes"),
            ("PORT", "8080"),
            ("PES_RUN_MIGRATIONS", "yes"),
            ("PES_SURVEY_ID", "3"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.run_migrations);
        assert_eq!(config.survey_id, 3);
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/pes"),
            ("PES_INSERT_CHUNK_SIZE", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PES_INSERT_CHUNK_SIZE", .. }));
    }

    #[test]
    fn test_chunk_size_capped_by_bind_limit() {
        let max = MAX_ANSWERS_PER_INSERT.to_string();
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/pes"),
            ("PES_INSERT_CHUNK_SIZE", max.as_str()),
        ])
        .unwrap();
        assert_eq!(config.insert_chunk_size, MAX_ANSWERS_PER_INSERT);

        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/pes"),
            ("PES_INSERT_CHUNK_SIZE", "10000"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "PES_INSERT_CHUNK_SIZE", ref value } if value == "10000"
        ));
    }

    #[test]
    fn test_rejects_bad_flag() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/pes"),
            ("PES_BACKFILL_MAPPINGS", "maybe"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PES_BACKFILL_MAPPINGS", .. }));
    }
}
