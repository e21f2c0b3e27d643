use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

const SESSION_COOKIE: &str = "__session";

/// Claims carried by an identity-provider session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id at the identity provider.
    pub sub: String,
    pub exp: i64,
    /// Session id.
    #[serde(default)]
    pub sid: Option<String>,
}

/// Verifies RS256 session tokens against the provider's public key.
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn from_rsa_pem(pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(AuthError::Key)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 5;
        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::Invalid)
    }

    /// Verify the session carried by a request, from the bearer header or the session cookie.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<SessionClaims, AuthError> {
        let token = session_token(headers).ok_or(AuthError::Missing)?;
        self.verify(token)
    }
}

/// Bearer token if present, otherwise the `__session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing session token")]
    Missing,

    #[error("Invalid session key: {0}")]
    Key(jsonwebtoken::errors::Error),

    #[error("Invalid session token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/session_key.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/session_key.pub.pem");

    fn token(exp_offset_secs: i64) -> String {
        let claims = SessionClaims {
            sub: "user_2abc".into(),
            exp: chrono::Utc::now().timestamp() + exp_offset_secs,
            sid: Some("sess_1".into()),
        };
        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_verifies() {
        let verifier = SessionVerifier::from_rsa_pem(PUBLIC_KEY).unwrap();
        let claims = verifier.verify(&token(300)).unwrap();
        assert_eq!(claims.sub, "user_2abc");
        assert_eq!(claims.sid.as_deref(), Some("sess_1"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = SessionVerifier::from_rsa_pem(PUBLIC_KEY).unwrap();
        assert!(matches!(verifier.verify(&token(-600)), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn test_garbage_key_is_rejected() {
        assert!(SessionVerifier::from_rsa_pem("not a pem").is_err());
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; __session=abc.def.ghi"));
        assert_eq!(session_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("__session=from-cookie"));
        assert_eq!(session_token(&headers), Some("from-header"));
    }

    #[test]
    fn test_missing_token() {
        let verifier = SessionVerifier::from_rsa_pem(PUBLIC_KEY).unwrap();
        assert!(matches!(
            verifier.verify_headers(&HeaderMap::new()),
            Err(AuthError::Missing)
        ));
    }
}
