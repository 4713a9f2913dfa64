use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::authz::token::KeyAlgorithm;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub keys: Keys,
    pub policy: Policy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keys {
    /// Public key tokens are verified against: PEM, or a JWK/JWKS when the
    /// file ends in `.json`. Default: data/public_key.pem
    pub public_key_path: PathBuf,
    /// JWS algorithm tokens are signed with (RS256, ES256, EdDSA, ...)
    pub alg: String,
    /// Clock skew tolerated when checking `exp`
    #[serde(default)]
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Directory scanned for `*.kdl` policy files
    pub policies_dir: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from("data/public_key.pem"),
            alg: "RS256".to_string(),
            leeway_secs: 0,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            policies_dir: PathBuf::from("policies"),
        }
    }
}

impl Keys {
    pub fn algorithm(&self) -> Result<KeyAlgorithm> {
        Ok(self.alg.parse::<KeyAlgorithm>()?)
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default(
                "keys.public_key_path",
                Keys::default()
                    .public_key_path
                    .to_string_lossy()
                    .to_string(),
            )
            .into_diagnostic()?
            .set_default("keys.alg", Keys::default().alg)
            .into_diagnostic()?
            .set_default("keys.leeway_secs", Keys::default().leeway_secs)
            .into_diagnostic()?
            .set_default(
                "policy.policies_dir",
                Policy::default().policies_dir.to_string_lossy().to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: PORTCULLIS__SERVER__PORT=9090, etc.
        builder =
            builder.add_source(config::Environment::with_prefix("PORTCULLIS").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        // Normalize paths to be relative to current dir
        let cwd = std::env::current_dir().into_diagnostic()?;
        if s.keys.public_key_path.is_relative() {
            s.keys.public_key_path = cwd.join(&s.keys.public_key_path);
        }
        if s.policy.policies_dir.is_relative() {
            s.policy.policies_dir = cwd.join(&s.policy.policies_dir);
        }

        Ok(s)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
