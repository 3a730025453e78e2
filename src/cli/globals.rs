use secrecy::SecretString;
use std::path::PathBuf;

/// Process-wide settings shared with every request through an `Extension`.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: u64,
    pub upload_dir: PathBuf,
    pub swagger_username: Option<String>,
    pub swagger_password: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(jwt_secret: SecretString, upload_dir: PathBuf) -> Self {
        Self {
            jwt_secret,
            jwt_ttl_seconds: 86_400,
            upload_dir,
            swagger_username: None,
            swagger_password: None,
        }
    }

    #[must_use]
    pub fn with_jwt_ttl_seconds(mut self, seconds: u64) -> Self {
        self.jwt_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_swagger_credentials(mut self, username: String, password: SecretString) -> Self {
        self.swagger_username = Some(username);
        self.swagger_password = Some(password);
        self
    }

    /// Directory images are written to and deleted from.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.upload_dir.join("images")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            PathBuf::from("/srv/uploads"),
        );
        assert_eq!(args.jwt_ttl_seconds, 86_400);
        assert_eq!(
            args.jwt_secret.expose_secret(),
            "0123456789abcdef0123456789abcdef"
        );
        assert_eq!(args.image_dir(), PathBuf::from("/srv/uploads/images"));
        assert!(args.swagger_username.is_none());
    }

    #[test]
    fn test_builders() {
        let args = GlobalArgs::new(SecretString::from("s".to_string()), PathBuf::from("u"))
            .with_jwt_ttl_seconds(120)
            .with_swagger_credentials("docs".to_string(), SecretString::from("pw".to_string()));
        assert_eq!(args.jwt_ttl_seconds, 120);
        assert_eq!(args.swagger_username.as_deref(), Some("docs"));
        assert_eq!(
            args.swagger_password.as_ref().map(|p| p.expose_secret()),
            Some("pw")
        );
    }
}
