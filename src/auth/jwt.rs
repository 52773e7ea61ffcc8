use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, StateClaims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

/// OAuth `state` tokens only need to outlive one provider round trip.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

fn window(ttl: Duration) -> (usize, usize) {
    let now = OffsetDateTime::now_utc();
    let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
    (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
}

impl JwtKeys {
    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    fn decode_as<T: DeserializeOwned>(&self, token: &str) -> anyhow::Result<T> {
        Ok(decode::<T>(token, &self.decoding, &self.validation())?.claims)
    }

    fn encode_claims<T: Serialize>(&self, claims: &T) -> anyhow::Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    fn sign_with_kind(&self, user_id: Uuid, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Refresh => self.refresh_ttl,
            _ => self.access_ttl,
        };
        let (iat, exp) = window(ttl);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = self.encode_claims(&claims)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let claims: Claims = self.decode_as(token)?;
        debug!(user_id = %claims.sub, kind = ?claims.kind, "jwt verified");
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }

    pub fn sign_state(&self, provider: &str) -> anyhow::Result<String> {
        let (iat, exp) = window(STATE_TTL);
        self.encode_claims(&StateClaims {
            provider: provider.to_string(),
            nonce: Uuid::new_v4(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::OauthState,
        })
    }

    /// Checks a `state` value came from us, is fresh, and was minted for `provider`.
    pub fn verify_state(&self, token: &str, provider: &str) -> anyhow::Result<()> {
        let claims: StateClaims = self.decode_as(token)?;
        if claims.kind != TokenKind::OauthState || claims.provider != provider {
            anyhow::bail!("state does not match provider");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id, "cook@example.com").expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "cook@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_and_access_are_not_interchangeable() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let refresh = keys.sign_refresh(user_id, "a@b.co").expect("sign refresh");
        assert_eq!(keys.verify_refresh(&refresh).unwrap().sub, user_id);
        assert!(keys.verify_access(&refresh).is_err());

        let access = keys.sign_access(user_id, "a@b.co").expect("sign access");
        let err = keys.verify_refresh(&access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign_access(Uuid::new_v4(), "a@b.co").expect("sign access");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_other_secret() {
        let keys = make_keys("secret-one", "iss", "aud");
        let other = make_keys("secret-two", "iss", "aud");
        let token = keys.sign_access(Uuid::new_v4(), "a@b.co").unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "late@example.com".into(),
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
            iss: "iss".into(),
            aud: "aud".into(),
            kind: TokenKind::Access,
        };
        let token = keys.encode_claims(&claims).unwrap();
        let err = keys.verify_access(&token).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("expired"));
    }

    #[test]
    fn state_is_bound_to_provider() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let state = keys.sign_state("google").unwrap();
        assert!(keys.verify_state(&state, "google").is_ok());
        assert!(keys.verify_state(&state, "github").is_err());

        let access = keys.sign_access(Uuid::new_v4(), "a@b.co").unwrap();
        assert!(keys.verify_state(&access, "google").is_err());
        assert!(keys.verify_access(&state).is_err());
    }
}
