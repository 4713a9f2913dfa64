use std::sync::Arc;

use clap::Parser;
use miette::Result;
use portcullis::authz::loader::load_policies;
use portcullis::authz::token::TrustedKey;
use portcullis::authz::AuthzState;
use portcullis::{settings, web};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "portcullis",
    version,
    about = "Role and authority based authorization for HTTP resources"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // trusted key for bearer tokens
    let trusted_key = TrustedKey::load(&settings.keys.public_key_path, settings.keys.algorithm()?)?
        .with_leeway(settings.keys.leeway())?;

    // policies are frozen once they are inside the shared state
    let registry = load_policies(&settings.policy.policies_dir)?;
    let state = Arc::new(AuthzState::new(registry, trusted_key));

    web::serve(settings, state).await?;
    Ok(())
}
