use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use josekit::jwk::Jwk;
use josekit::jws::{JwsVerifier, EdDSA, ES256, ES384, RS256, RS384, RS512};
use josekit::jwt::{self, JwtPayload};
use josekit::JoseError;
use serde_json::{Map, Value};

use crate::authz::errors::{AuthzError, TokenError};

const ROLES_CLAIM: &str = "roles";
const AUTHORITIES_CLAIM: &str = "authorities";

/// JWS algorithms accepted for the trusted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    EdDsa,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rs256 => "RS256",
            KeyAlgorithm::Rs384 => "RS384",
            KeyAlgorithm::Rs512 => "RS512",
            KeyAlgorithm::Es256 => "ES256",
            KeyAlgorithm::Es384 => "ES384",
            KeyAlgorithm::EdDsa => "EdDSA",
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(KeyAlgorithm::Rs256),
            "RS384" => Ok(KeyAlgorithm::Rs384),
            "RS512" => Ok(KeyAlgorithm::Rs512),
            "ES256" => Ok(KeyAlgorithm::Es256),
            "ES384" => Ok(KeyAlgorithm::Es384),
            "EDDSA" => Ok(KeyAlgorithm::EdDsa),
            _ => Err(AuthzError::InvalidKey(format!("unsupported algorithm `{s}`"))),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification-only public key tokens must be signed with.
pub struct TrustedKey {
    algorithm: KeyAlgorithm,
    verifier: Box<dyn JwsVerifier + Send + Sync>,
    leeway: TimeDelta,
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKey")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.verifier.key_id())
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl TrustedKey {
    /// Build from a PEM encoded public key.
    pub fn from_pem(algorithm: KeyAlgorithm, pem: impl AsRef<[u8]>) -> Result<Self, AuthzError> {
        let pem = pem.as_ref();
        let verifier: Box<dyn JwsVerifier + Send + Sync> = match algorithm {
            KeyAlgorithm::Rs256 => Box::new(RS256.verifier_from_pem(pem).map_err(invalid_key)?),
            KeyAlgorithm::Rs384 => Box::new(RS384.verifier_from_pem(pem).map_err(invalid_key)?),
            KeyAlgorithm::Rs512 => Box::new(RS512.verifier_from_pem(pem).map_err(invalid_key)?),
            KeyAlgorithm::Es256 => Box::new(ES256.verifier_from_pem(pem).map_err(invalid_key)?),
            KeyAlgorithm::Es384 => Box::new(ES384.verifier_from_pem(pem).map_err(invalid_key)?),
            KeyAlgorithm::EdDsa => Box::new(EdDSA.verifier_from_pem(pem).map_err(invalid_key)?),
        };
        Ok(Self::new(algorithm, verifier))
    }

    /// Build from a public JWK.
    pub fn from_jwk(algorithm: KeyAlgorithm, jwk: &Jwk) -> Result<Self, AuthzError> {
        let verifier: Box<dyn JwsVerifier + Send + Sync> = match algorithm {
            KeyAlgorithm::Rs256 => Box::new(RS256.verifier_from_jwk(jwk).map_err(invalid_key)?),
            KeyAlgorithm::Rs384 => Box::new(RS384.verifier_from_jwk(jwk).map_err(invalid_key)?),
            KeyAlgorithm::Rs512 => Box::new(RS512.verifier_from_jwk(jwk).map_err(invalid_key)?),
            KeyAlgorithm::Es256 => Box::new(ES256.verifier_from_jwk(jwk).map_err(invalid_key)?),
            KeyAlgorithm::Es384 => Box::new(ES384.verifier_from_jwk(jwk).map_err(invalid_key)?),
            KeyAlgorithm::EdDsa => Box::new(EdDSA.verifier_from_jwk(jwk).map_err(invalid_key)?),
        };
        Ok(Self::new(algorithm, verifier))
    }

    /// Build from a JWK or a JWKS document (`{"keys": [...]}`).
    /// From a JWKS the first signing key wins, falling back to the first key.
    pub fn from_json(algorithm: KeyAlgorithm, value: &Value) -> Result<Self, AuthzError> {
        let key_value = match value.get("keys") {
            Some(Value::Array(keys)) => keys
                .iter()
                .find(|k| k.get("use").and_then(Value::as_str) == Some("sig"))
                .or_else(|| keys.first())
                .ok_or_else(|| AuthzError::InvalidKey("JWKS contains no keys".into()))?,
            Some(_) => return Err(AuthzError::InvalidKey("`keys` must be an array".into())),
            None => value,
        };
        if !key_value.is_object() {
            return Err(AuthzError::InvalidKey("JWK must be a JSON object".into()));
        }
        let bytes = serde_json::to_vec(key_value)
            .map_err(|e| AuthzError::InvalidKey(format!("invalid JWK: {e}")))?;
        let jwk = Jwk::from_bytes(bytes).map_err(invalid_key)?;
        Self::from_jwk(algorithm, &jwk)
    }

    /// Load from disk. `.json` files are read as JWK/JWKS, anything else as PEM.
    pub fn load(path: &Path, algorithm: KeyAlgorithm) -> Result<Self, AuthzError> {
        let contents = std::fs::read(path).map_err(|source| AuthzError::KeyLoadError {
            path: path.display().to_string(),
            source,
        })?;
        let key = if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            let value: Value = serde_json::from_slice(&contents)
                .map_err(|e| AuthzError::InvalidKey(format!("invalid JWK JSON: {e}")))?;
            Self::from_json(algorithm, &value)?
        } else {
            Self::from_pem(algorithm, &contents)?
        };
        tracing::info!(path = %path.display(), alg = %algorithm, "Loaded trusted key");
        Ok(key)
    }

    /// Accept tokens up to `leeway` past their expiry.
    pub fn with_leeway(mut self, leeway: std::time::Duration) -> Result<Self, AuthzError> {
        self.leeway = TimeDelta::from_std(leeway)
            .map_err(|_| AuthzError::InvalidLeeway(leeway.as_secs()))?;
        Ok(self)
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn leeway(&self) -> TimeDelta {
        self.leeway
    }

    fn new(algorithm: KeyAlgorithm, verifier: Box<dyn JwsVerifier + Send + Sync>) -> Self {
        Self {
            algorithm,
            verifier,
            leeway: TimeDelta::zero(),
        }
    }
}

fn invalid_key(err: JoseError) -> AuthzError {
    AuthzError::InvalidKey(err.to_string())
}

/// Caller attributes taken from a verified token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedClaims {
    pub subject: Option<String>,
    pub roles: HashSet<String>,
    pub authorities: HashSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Every other claim, untouched
    pub additional: Map<String, Value>,
}

/// Verify `raw_token` against `key` at the current instant.
pub fn verify(raw_token: &str, key: &TrustedKey) -> Result<VerifiedClaims, TokenError> {
    verify_at(raw_token, key, Utc::now())
}

/// Verify `raw_token` against `key` as of `now`.
pub fn verify_at(
    raw_token: &str,
    key: &TrustedKey,
    now: DateTime<Utc>,
) -> Result<VerifiedClaims, TokenError> {
    let segments: Vec<&str> = raw_token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::InvalidTokenFormat);
    }

    let (payload, _header) =
        jwt::decode_with_verifier(raw_token, key.verifier.as_ref()).map_err(map_jose_error)?;

    let expires_at = expiry(&payload)?;
    if let Some(exp) = expires_at {
        // past the representable range means it never expires in practice
        match exp.checked_add_signed(key.leeway) {
            Some(deadline) if deadline <= now => return Err(TokenError::TokenExpired),
            _ => {}
        }
    }

    claims_from_payload(payload, expires_at)
}

/// The `exp` claim as an instant; out-of-range timestamps are malformed.
fn expiry(payload: &JwtPayload) -> Result<Option<DateTime<Utc>>, TokenError> {
    let Some(value) = payload.claim("exp") else {
        return Ok(None);
    };
    value
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(Some)
        .ok_or_else(|| TokenError::TokenMalformed("the `exp` claim is out of range".into()))
}

fn claims_from_payload(
    payload: JwtPayload,
    expires_at: Option<DateTime<Utc>>,
) -> Result<VerifiedClaims, TokenError> {
    let subject = payload.subject().map(str::to_string);
    let mut additional: Map<String, Value> = payload.claims_set().clone();

    let roles = string_set(additional.remove(ROLES_CLAIM), ROLES_CLAIM)?;
    let authorities = string_set(additional.remove(AUTHORITIES_CLAIM), AUTHORITIES_CLAIM)?;
    additional.remove("sub");
    additional.remove("exp");

    Ok(VerifiedClaims {
        subject,
        roles,
        authorities,
        expires_at,
        additional,
    })
}

/// An absent or null claim is an empty set; anything but a list of strings is malformed.
fn string_set(value: Option<Value>, claim: &str) -> Result<HashSet<String>, TokenError> {
    let malformed =
        || TokenError::TokenMalformed(format!("the `{claim}` claim must be a list of strings"));
    match value {
        None | Some(Value::Null) => Ok(HashSet::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(malformed()),
            })
            .collect(),
        Some(_) => Err(malformed()),
    }
}

fn map_jose_error(err: JoseError) -> TokenError {
    match err {
        JoseError::InvalidSignature(_) => TokenError::SignatureInvalid,
        other => TokenError::TokenMalformed(other.to_string()),
    }
}
