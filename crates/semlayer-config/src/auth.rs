//! Authentication mode resolution for warehouse connections.

use semlayer_core::{Result, SemlayerError};

use crate::schema::SnowflakeConfig;

/// The single credential mode a connection will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Password {
        password: String,
    },
    KeyPair {
        private_key_path: String,
        passphrase: Option<String>,
    },
    Token {
        token: String,
        authenticator: Option<String>,
    },
    Authenticator {
        authenticator: String,
        password: Option<String>,
    },
}

impl AuthMode {
    /// Short label for log lines; never includes secrets.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMode::Password { .. } => "password",
            AuthMode::KeyPair { .. } => "key_pair",
            AuthMode::Token { .. } => "token",
            AuthMode::Authenticator { .. } => "authenticator",
        }
    }
}

impl SnowflakeConfig {
    /// Resolve exactly one authentication mode.
    ///
    /// `password`, `private_key_path` and `token` are mutually exclusive.
    /// `authenticator` may accompany a password (MFA, federated login) or a
    /// token (`oauth`), but not a private key.
    pub fn auth_mode(&self) -> Result<AuthMode> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();

        let password = non_empty(&self.password);
        let key_path = non_empty(&self.private_key_path);
        let token = non_empty(&self.token);
        let authenticator = non_empty(&self.authenticator);

        let primary: Vec<&str> = [
            password.as_ref().map(|_| "password"),
            key_path.as_ref().map(|_| "private_key_path"),
            token.as_ref().map(|_| "token"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if primary.len() > 1 {
            return Err(SemlayerError::ConflictingAuthentication(format!(
                "only one of password, private_key_path or token may be set (found {})",
                primary.join(", ")
            )));
        }

        match (password, key_path, token, authenticator) {
            (_, Some(_), _, Some(_)) => Err(SemlayerError::ConflictingAuthentication(
                "authenticator cannot be combined with private_key_path".to_string(),
            )),
            (_, Some(private_key_path), _, None) => Ok(AuthMode::KeyPair {
                private_key_path,
                passphrase: non_empty(&self.private_key_passphrase),
            }),
            (_, _, Some(token), authenticator) => Ok(AuthMode::Token {
                token,
                authenticator,
            }),
            (password, _, _, Some(authenticator)) => Ok(AuthMode::Authenticator {
                authenticator,
                password,
            }),
            (Some(password), _, _, None) => Ok(AuthMode::Password { password }),
            (None, None, None, None) => Err(SemlayerError::MissingCredential(
                "snowflake.password, snowflake.private_key_path, snowflake.token or snowflake.authenticator"
                    .to_string(),
            )),
        }
    }
}
