use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use josekit::jws::RS256;
use portcullis::authz::token::{KeyAlgorithm, TrustedKey};

/// An RS256 key pair; the public half is what the service trusts.
pub struct TestKeys {
    pub public_pem: Vec<u8>,
    pub private_pem: Vec<u8>,
}

impl TestKeys {
    /// Generating RSA keys is slow, so tests share one pair.
    pub fn shared() -> &'static TestKeys {
        static KEYS: OnceLock<TestKeys> = OnceLock::new();
        KEYS.get_or_init(TestKeys::generate)
    }

    pub fn generate() -> Self {
        let pair = RS256
            .generate_key_pair(2048)
            .expect("Failed to generate key pair");
        Self {
            public_pem: pair.to_pem_public_key(),
            private_pem: pair.to_pem_private_key(),
        }
    }

    /// Write the public key where the service can load it from.
    pub fn write_public_pem(&self, dir: &Path) -> PathBuf {
        let path = dir.join("public_key.pem");
        std::fs::write(&path, &self.public_pem).expect("Failed to write public key");
        path
    }

    pub fn trusted_key(&self) -> TrustedKey {
        TrustedKey::from_pem(KeyAlgorithm::Rs256, &self.public_pem)
            .expect("Failed to build trusted key")
    }
}
