use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use storefront_types::domain::identity::AnonymousId;

use crate::config::{AuthConfig, MAX_TOKEN_TTL_DAYS};
use crate::errors::AppError;

pub const INVALID_IDENTITY: &str = "A valid user identifier could not be found.";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "AnonymousUserId")]
    anonymous_user_id: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

/// Response body of `GET /api/auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub anonymous_user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and checks HS256 bearer tokens that carry an anonymous shopper id.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = &config.issuer {
            validation.set_issuer(&[iss]);
        }
        match &config.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            encoding: EncodingKey::from_secret(config.jwt_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_key.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::days(config.token_ttl_days.clamp(1, MAX_TOKEN_TTL_DAYS)),
        }
    }

    /// Issues a token for a freshly generated identity.
    pub fn issue(&self) -> Result<IssuedToken, AppError> {
        self.issue_for(&AnonymousId::generate(), Utc::now())
    }

    pub fn issue_for(
        &self,
        identity: &AnonymousId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            anonymous_user_id: identity.as_str().to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))?;
        tracing::debug!(anonymous_user_id = %identity, "issued anonymous token");
        Ok(IssuedToken {
            token,
            anonymous_user_id: claims.anonymous_user_id,
            expires_at,
        })
    }

    /// Returns the identity carried by a valid token.
    pub fn verify(&self, token: &str) -> Result<AnonymousId, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::warn!(error = %e, "rejected bearer token");
            AppError::Unauthorized(INVALID_IDENTITY.into())
        })?;
        AnonymousId::parse(data.claims.anonymous_user_id)
            .map_err(|_| AppError::Unauthorized(INVALID_IDENTITY.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(issuer: Option<&str>, audience: Option<&str>) -> TokenService {
        TokenService::new(&AuthConfig {
            issuer: issuer.map(Into::into),
            audience: audience.map(Into::into),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let svc = service(None, None);
        let issued = svc.issue().unwrap();
        let identity = svc.verify(&issued.token).unwrap();
        assert_eq!(identity.as_str(), issued.anonymous_user_id);
    }

    #[test]
    fn out_of_range_ttl_is_clamped() {
        let svc = TokenService::new(&AuthConfig {
            token_ttl_days: i64::MAX,
            ..AuthConfig::default()
        });
        let now = Utc::now();
        let issued = svc.issue_for(&AnonymousId::generate(), now).unwrap();
        assert_eq!(issued.expires_at, now + Duration::days(MAX_TOKEN_TTL_DAYS));
    }

    #[test]
    fn expiry_follows_configured_ttl() {
        let svc = service(None, None);
        let now = Utc::now();
        let issued = svc.issue_for(&AnonymousId::generate(), now).unwrap();
        assert_eq!(issued.expires_at, now + Duration::days(30));
    }

    #[test]
    fn rejects_expired_tampered_and_foreign_tokens() {
        let svc = service(Some("storefront"), Some("shoppers"));
        let stale = svc
            .issue_for(&AnonymousId::generate(), Utc::now() - Duration::days(31))
            .unwrap();
        assert!(matches!(svc.verify(&stale.token), Err(AppError::Unauthorized(_))));

        let good = svc.issue().unwrap();
        let tampered = format!("{}x", good.token);
        assert!(matches!(svc.verify(&tampered), Err(AppError::Unauthorized(_))));

        let other = service(Some("elsewhere"), Some("shoppers")).issue().unwrap();
        assert!(matches!(svc.verify(&other.token), Err(AppError::Unauthorized(_))));

        assert!(matches!(svc.verify("not-a-jwt"), Err(AppError::Unauthorized(_))));
    }
}
