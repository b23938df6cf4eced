use serde::Deserialize;
use std::env;

/// Signing key used when `JWT_KEY` is unset. Only fit for local development.
pub const DEV_JWT_KEY: &str = "storefront-development-signing-key-do-not-deploy";
pub const MIN_JWT_KEY_LEN: usize = 32;
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_key: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_key: DEV_JWT_KEY.into(),
            issuer: None,
            audience: None,
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let server_port = env::var("SERVER_PORT").unwrap_or_else(|_| "3000".into());
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        let auth = AuthConfig::from_vars(
            env::var("JWT_KEY").ok(),
            env::var("JWT_ISSUER").ok(),
            env::var("JWT_AUDIENCE").ok(),
            env::var("TOKEN_TTL_DAYS").ok(),
        )?;
        Ok(Self {
            server_port,
            database_url,
            auth,
        })
    }
}

impl AuthConfig {
    fn from_vars(
        key: Option<String>,
        issuer: Option<String>,
        audience: Option<String>,
        ttl_days: Option<String>,
    ) -> anyhow::Result<Self> {
        let jwt_key = match key {
            Some(k) if k.len() >= MIN_JWT_KEY_LEN => k,
            Some(_) => anyhow::bail!("JWT_KEY must be at least {MIN_JWT_KEY_LEN} bytes"),
            None => {
                tracing::warn!("JWT_KEY not set, using the development signing key");
                DEV_JWT_KEY.into()
            }
        };
        let token_ttl_days = match ttl_days {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| (1..=MAX_TOKEN_TTL_DAYS).contains(d))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "TOKEN_TTL_DAYS must be an integer between 1 and {MAX_TOKEN_TTL_DAYS}, got '{raw}'"
                    )
                })?,
            None => DEFAULT_TOKEN_TTL_DAYS,
        };
        Ok(Self {
            jwt_key,
            issuer: issuer.filter(|v| !v.is_empty()),
            audience: audience.filter(|v| !v.is_empty()),
            token_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let auth = AuthConfig::from_vars(None, None, None, None).unwrap();
        assert_eq!(auth.jwt_key, DEV_JWT_KEY);
        assert_eq!(auth.token_ttl_days, 30);
        assert!(auth.issuer.is_none());
    }

    #[test]
    fn rejects_short_key_and_bad_ttl() {
        assert!(AuthConfig::from_vars(Some("short".into()), None, None, None).is_err());
        let key = Some("k".repeat(MIN_JWT_KEY_LEN));
        assert!(AuthConfig::from_vars(key.clone(), None, None, Some("0".into())).is_err());
        assert!(AuthConfig::from_vars(key.clone(), None, None, Some("ten".into())).is_err());
        let huge = Some("99999999999999".into());
        assert!(AuthConfig::from_vars(key.clone(), None, None, huge).is_err());
        let limit = AuthConfig::from_vars(key.clone(), None, None, Some(MAX_TOKEN_TTL_DAYS.to_string()))
            .unwrap();
        assert_eq!(limit.token_ttl_days, MAX_TOKEN_TTL_DAYS);
        let auth = AuthConfig::from_vars(key, Some("shop".into()), Some(String::new()), Some("7".into()))
            .unwrap();
        assert_eq!(auth.token_ttl_days, 7);
        assert_eq!(auth.issuer.as_deref(), Some("shop"));
        assert!(auth.audience.is_none());
    }
}
