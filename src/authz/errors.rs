use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(portcullis::authz::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(portcullis::authz::invalid_policy),
        help("Each resource block may contain `deny-all`, `require`, `deny` and `exempt` statements, e.g. require \"role\" \"admin\" methods=\"PUT POST\"")
    )]
    InvalidPolicy(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(portcullis::authz::kdl_parse),
        help("Check your KDL file syntax, see https://kdl.dev for the syntax")
    )]
    KdlParse(String),

    #[error("Unknown HTTP method `{0}`")]
    #[diagnostic(
        code(portcullis::authz::unknown_method),
        help("Supported methods: GET, POST, PUT, PATCH, DELETE")
    )]
    UnknownMethod(String),

    #[error("Failed to load trusted key `{path}`")]
    #[diagnostic(
        code(portcullis::authz::key_load),
        help("Point keys.public_key_path at a PEM public key, a JWK or a JWKS document")
    )]
    KeyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trusted key: {0}")]
    #[diagnostic(
        code(portcullis::authz::invalid_key),
        help("Supported algorithms: RS256, RS384, RS512, ES256, ES384, EdDSA")
    )]
    InvalidKey(String),

    #[error("Leeway of {0}s is out of range")]
    #[diagnostic(
        code(portcullis::authz::invalid_leeway),
        help("keys.leeway_secs is a clock skew allowance, keep it to a few minutes")
    )]
    InvalidLeeway(u64),

    #[error("I/O error: {0}")]
    #[diagnostic(code(portcullis::authz::io))]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthzError::UnknownMethod(_) | AuthzError::InvalidPolicy(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Bearer token verification failures. The display text is what callers see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token format: expected header.payload.signature")]
    InvalidTokenFormat,

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Signature has expired")]
    TokenExpired,

    #[error("Malformed token: {0}")]
    TokenMalformed(String),
}
