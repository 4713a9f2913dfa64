use std::time::{Duration, SystemTime};

use josekit::jws::{JwsHeader, RS256};
use josekit::jwt::{self, JwtPayload};
use serde_json::json;
use tempfile::TempDir;

use super::keys::TestKeys;

/// Builder for bearer tokens signed by a test key
pub struct TokenBuilder {
    subject: String,
    roles: Vec<String>,
    authorities: Vec<String>,
    expires_in: i64,
}

impl TokenBuilder {
    pub fn new() -> Self {
        Self {
            subject: "some_user".to_string(),
            roles: Vec::new(),
            authorities: Vec::new(),
            expires_in: 3600,
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_authorities(mut self, authorities: &[&str]) -> Self {
        self.authorities = authorities.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Negative values issue an already expired token.
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn sign(self, keys: &TestKeys) -> String {
        let signer = RS256
            .signer_from_pem(&keys.private_pem)
            .expect("Failed to build signer");
        let mut header = JwsHeader::new();
        header.set_token_type("JWT");

        let now = SystemTime::now();
        let exp = if self.expires_in >= 0 {
            now + Duration::from_secs(self.expires_in as u64)
        } else {
            now - Duration::from_secs(self.expires_in.unsigned_abs())
        };

        let mut payload = JwtPayload::new();
        payload.set_subject(&self.subject);
        payload.set_expires_at(&exp);
        payload
            .set_claim("roles", Some(json!(self.roles)))
            .expect("Failed to set roles");
        payload
            .set_claim("authorities", Some(json!(self.authorities)))
            .expect("Failed to set authorities");

        jwt::encode_with_signer(&payload, &header, &signer).expect("Failed to sign token")
    }

    pub fn bearer(self, keys: &TestKeys) -> String {
        format!("Bearer {}", self.sign(keys))
    }
}

/// Builder for a temporary directory of KDL policy files
pub struct PolicyDirBuilder {
    files: Vec<(String, String)>,
}

impl PolicyDirBuilder {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn build(self) -> TempDir {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for (name, contents) in self.files {
            std::fs::write(dir.path().join(name), contents).expect("Failed to write policy file");
        }
        dir
    }
}
