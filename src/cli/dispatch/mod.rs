use crate::cli::{
    actions::{server::Args, Action},
    commands::{
        ARG_DSN, ARG_JWT_SECRET, ARG_JWT_TTL, ARG_PORT, ARG_SWAGGER_PASSWORD, ARG_SWAGGER_USERNAME,
        ARG_UPLOAD_DIR,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5000);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret = matches
        .get_one::<String>(ARG_JWT_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;
    let jwt_ttl_seconds = matches.get_one::<u64>(ARG_JWT_TTL).copied().unwrap_or(86_400);
    let upload_dir = matches
        .get_one::<String>(ARG_UPLOAD_DIR)
        .map_or_else(|| PathBuf::from("./uploads"), PathBuf::from);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        jwt_ttl_seconds,
        upload_dir,
        swagger_username: matches.get_one::<String>(ARG_SWAGGER_USERNAME).cloned(),
        swagger_password: matches
            .get_one::<String>(ARG_SWAGGER_PASSWORD)
            .cloned()
            .map(SecretString::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("SHOPDESK_DSN", Some("postgres://user@localhost:5432/shopdesk")),
                (
                    "SHOPDESK_JWT_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("SHOPDESK_PORT", Some("9000")),
                ("SHOPDESK_SWAGGER_USERNAME", Some("docs")),
                ("SHOPDESK_SWAGGER_PASSWORD", Some("docs-password")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["shopdesk"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 9000);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/shopdesk");
                    assert_eq!(
                        args.jwt_secret.expose_secret(),
                        "0123456789abcdef0123456789abcdef"
                    );
                    assert_eq!(args.swagger_username.as_deref(), Some("docs"));
                    assert!(args.swagger_password.is_some());
                }
            },
        );
    }
}
