use crate::{api, cli::globals::GlobalArgs};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: u64,
    pub upload_dir: PathBuf,
    pub swagger_username: Option<String>,
    pub swagger_password: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the upload directory cannot be
/// created, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = Url::parse(&args.dsn).context("Invalid database connection string")?;

    let mut globals =
        GlobalArgs::new(args.jwt_secret, args.upload_dir).with_jwt_ttl_seconds(args.jwt_ttl_seconds);

    if let (Some(username), Some(password)) = (args.swagger_username, args.swagger_password) {
        globals = globals.with_swagger_credentials(username, password);
    }

    tokio::fs::create_dir_all(globals.image_dir())
        .await
        .with_context(|| format!("Failed to create {}", globals.image_dir().display()))?;

    debug!(
        "Database host: {}, upload dir: {}",
        dsn.host_str().unwrap_or("unknown"),
        globals.upload_dir.display()
    );

    api::new(args.port, dsn.to_string(), &globals).await
}
