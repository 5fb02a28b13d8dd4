use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Upper bound on token lifetime, one year.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// JWT payload used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub exp: usize,  // expires at (unix timestamp)
    pub iat: usize,  // issued at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Signing and verification keys with the token settings.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: ttl_from_minutes(cfg.ttl_minutes),
        }
    }

    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = self.ttl.min(MAX_TTL);
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

fn ttl_from_minutes(minutes: i64) -> Duration {
    let secs = u64::try_from(minutes).unwrap_or(0).saturating_mul(60);
    Duration::from_secs(secs).min(MAX_TTL)
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

/// Extracts and validates the bearer token, yielding the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                Err(AppError::Unauthorized("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn keys_for(audience: &str) -> JwtKeys {
        let mut cfg = AppConfig::in_memory("test-secret").jwt;
        cfg.audience = audience.into();
        JwtKeys::from_config(&cfg)
    }

    #[test]
    fn sign_and_verify() {
        let keys = keys_for("chirp-users");
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "chirp");
        assert_eq!(claims.aud, "chirp-users");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn verify_rejects_other_audience() {
        let token = keys_for("chirp-users").sign(Uuid::new_v4()).unwrap();
        assert!(keys_for("someone-else").verify(&token).is_err());
    }

    #[test]
    fn huge_ttl_is_capped_and_still_signs() {
        let mut cfg = AppConfig::in_memory("test-secret").jwt;
        cfg.ttl_minutes = i64::MAX;
        let keys = JwtKeys::from_config(&cfg);
        assert_eq!(keys.ttl, MAX_TTL);
        let claims = keys.verify(&keys.sign(Uuid::new_v4()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TTL.as_secs() as usize);
    }

    #[test]
    fn negative_ttl_is_zero() {
        assert_eq!(ttl_from_minutes(-5), Duration::ZERO);
        assert_eq!(ttl_from_minutes(5), Duration::from_secs(300));
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(keys_for("chirp-users").verify("not.a.jwt").is_err());
    }
}
