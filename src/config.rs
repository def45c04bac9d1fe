use crate::error::AppError;
use crate::services::{ConversationLimits, RemovalPolicy};
use dotenvy::dotenv;
use std::env;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub removal_policy: RemovalPolicy,
    pub limits: ConversationLimits,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&var, "PORT", 3000u16)?;

        let session_secret = var("SESSION_SECRET")
            .ok_or_else(|| AppError::Config("SESSION_SECRET missing".into()))?;
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        let session_ttl_seconds = parse_or(&var, "SESSION_TTL_SECONDS", 86_400i64)?;
        if session_ttl_seconds <= 0 {
            return Err(AppError::Config("SESSION_TTL_SECONDS must be positive".into()));
        }

        let removal_policy = match var("REMOVAL_POLICY") {
            Some(raw) => raw.parse::<RemovalPolicy>().map_err(AppError::Config)?,
            None => RemovalPolicy::default(),
        };

        let defaults = ConversationLimits::default();
        let limits = ConversationLimits {
            max_group_name_len: parse_or(&var, "MAX_GROUP_NAME_LEN", defaults.max_group_name_len)?,
            max_group_members: parse_or(&var, "MAX_GROUP_MEMBERS", defaults.max_group_members)?,
        };
        if limits.max_group_name_len == 0 || limits.max_group_members < 2 {
            return Err(AppError::Config(
                "MAX_GROUP_NAME_LEN must be positive and MAX_GROUP_MEMBERS at least 2".into(),
            ));
        }

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!("Invalid LOG_FORMAT: {}", other)));
            }
        };

        Ok(Self {
            host,
            port,
            session_secret,
            session_ttl_seconds,
            removal_policy,
            limits,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {}: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load(&[("SESSION_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3000");
        assert_eq!(cfg.session_ttl_seconds, 86_400);
        assert_eq!(cfg.removal_policy, RemovalPolicy::AnyMember);
        assert_eq!(cfg.limits.max_group_name_len, 255);
        assert_eq!(cfg.limits.max_group_members, 512);
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let cfg = load(&[
            ("SESSION_SECRET", SECRET),
            ("HOST", "127.0.0.1"),
            ("PORT", "8088"),
            ("REMOVAL_POLICY", "self_only"),
            ("MAX_GROUP_MEMBERS", "16"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8088");
        assert_eq!(cfg.removal_policy, RemovalPolicy::SelfOnly);
        assert_eq!(cfg.limits.max_group_members, 16);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_secret_required_and_long_enough() {
        assert!(matches!(load(&[]), Err(AppError::Config(_))));
        assert!(matches!(
            load(&[("SESSION_SECRET", "short")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for (key, value) in [
            ("PORT", "http"),
            ("SESSION_TTL_SECONDS", "-5"),
            ("REMOVAL_POLICY", "admins"),
            ("MAX_GROUP_MEMBERS", "1"),
            ("LOG_FORMAT", "xml"),
        ] {
            assert!(
                matches!(load(&[("SESSION_SECRET", SECRET), (key, value)]), Err(AppError::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
