//! Token fixtures shared by unit tests.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use josekit::jwk::Jwk;
use josekit::jws::{JwsHeader, JwsSigner, RS256};
use josekit::jwt::{self, JwtPayload};
use serde_json::{json, Value};

use crate::authz::token::{KeyAlgorithm, TrustedKey};

pub struct Fixture {
    pub key: TrustedKey,
    pub public_pem: Vec<u8>,
    pub public_jwk: Jwk,
    private_pem: Vec<u8>,
    other_private_pem: Vec<u8>,
}

/// RSA key pairs are slow to generate, so every test shares one.
pub fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let pair = RS256.generate_key_pair(2048).expect("Failed to generate key pair");
        let other = RS256.generate_key_pair(2048).expect("Failed to generate key pair");
        let public_pem = pair.to_pem_public_key();
        Fixture {
            key: TrustedKey::from_pem(KeyAlgorithm::Rs256, &public_pem)
                .expect("Failed to build trusted key"),
            public_pem,
            public_jwk: pair.to_jwk_public_key(),
            private_pem: pair.to_pem_private_key(),
            other_private_pem: other.to_pem_private_key(),
        }
    })
}

impl Fixture {
    pub fn issue(&self, spec: TokenSpec) -> String {
        sign(&self.private_pem, spec)
    }

    pub fn issue_with_other_key(&self, spec: TokenSpec) -> String {
        sign(&self.other_private_pem, spec)
    }

    pub fn fresh_key(&self) -> TrustedKey {
        TrustedKey::from_pem(KeyAlgorithm::Rs256, &self.public_pem)
            .expect("Failed to build trusted key")
    }

    pub fn bearer(&self, spec: TokenSpec) -> String {
        format!("Bearer {}", self.issue(spec))
    }
}

fn sign(private_pem: &[u8], spec: TokenSpec) -> String {
    let signer = RS256.signer_from_pem(private_pem).expect("Failed to build signer");
    sign_with(&signer, spec)
}

/// Issue a token with any JWS signer, for keys other than the shared RSA pair.
pub fn sign_with(signer: &dyn JwsSigner, spec: TokenSpec) -> String {
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");

    let mut payload = JwtPayload::new();
    payload.set_subject("some_user");
    if let Some(secs) = spec.expires_in {
        let now = SystemTime::now();
        let exp = if secs >= 0 {
            now + Duration::from_secs(secs as u64)
        } else {
            now - Duration::from_secs(secs.unsigned_abs())
        };
        payload.set_expires_at(&exp);
    }
    for (name, value) in spec.claims {
        payload
            .set_claim(&name, Some(value))
            .expect("Failed to set claim");
    }
    jwt::encode_with_signer(&payload, &header, signer).expect("Failed to sign token")
}

/// Claims of a token to issue.
pub struct TokenSpec {
    expires_in: Option<i64>,
    claims: Vec<(String, Value)>,
}

impl TokenSpec {
    pub fn new() -> Self {
        Self {
            expires_in: Some(3600),
            claims: Vec::new(),
        }
    }

    pub fn roles(self, roles: &[&str]) -> Self {
        self.claim("roles", json!(roles))
    }

    pub fn authorities(self, authorities: &[&str]) -> Self {
        self.claim("authorities", json!(authorities))
    }

    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.push((name.to_string(), value));
        self
    }

    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_in = Some(secs);
        self
    }

    pub fn no_expiry(mut self) -> Self {
        self.expires_in = None;
        self
    }
}
