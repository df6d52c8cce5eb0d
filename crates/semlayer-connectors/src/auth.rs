//! Key-pair authentication
//!
//! The warehouse accepts an RS256 JWT signed with the user's private key.
//! The issuer claim carries the SHA-256 fingerprint of the matching public
//! key, so the server can pick the registered key without a lookup by id.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ConnectorError;

/// Tokens are accepted for at most one hour.
const JWT_LIFETIME_MINUTES: i64 = 59;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A parsed RSA private key plus its public-key fingerprint.
pub struct KeyPair {
    key: RsaPrivateKey,
    fingerprint: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Read a PEM key from disk; `~` is expanded to the home directory.
    pub fn from_file(path: &str, passphrase: Option<&str>) -> Result<Self, ConnectorError> {
        let resolved = expand_home(path);
        let pem = std::fs::read_to_string(&resolved).map_err(|e| {
            ConnectorError::InvalidKey(format!("cannot read {}: {}", resolved.display(), e))
        })?;
        debug!("Loaded private key from {:?}", resolved);
        Self::from_pem(&pem, passphrase)
    }

    /// Parse PKCS#8 (plain or encrypted) or PKCS#1 PEM text.
    pub fn from_pem(pem: &str, passphrase: Option<&str>) -> Result<Self, ConnectorError> {
        let invalid = |e: &dyn std::fmt::Display| ConnectorError::InvalidKey(e.to_string());

        let key = if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
            let passphrase = passphrase.ok_or_else(|| {
                ConnectorError::InvalidKey(
                    "key is encrypted but no private_key_passphrase was given".to_string(),
                )
            })?;
            RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())
                .map_err(|e| invalid(&e))?
        } else if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| invalid(&e))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| invalid(&e))?
        };

        let public_der = RsaPublicKey::from(&key)
            .to_public_key_der()
            .map_err(|e| invalid(&e))?;
        let digest = Sha256::digest(public_der.as_bytes());
        let fingerprint = format!("SHA256:{}", STANDARD.encode(digest));

        Ok(Self { key, fingerprint })
    }

    /// `SHA256:<base64 digest of the DER public key>`
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Sign a login JWT for `account` / `user` issued at `now`.
    pub fn login_jwt(
        &self,
        account: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ConnectorError> {
        let qualified_user = format!("{}.{}", account_identifier(account), user.to_uppercase());
        let claims = JwtClaims {
            iss: format!("{}.{}", qualified_user, self.fingerprint),
            sub: qualified_user,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(JWT_LIFETIME_MINUTES)).timestamp(),
        };

        let der = self
            .key
            .to_pkcs1_der()
            .map_err(|e| ConnectorError::InvalidKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| ConnectorError::InvalidKey(format!("failed to sign JWT: {}", e)))
    }

    #[cfg(test)]
    pub(crate) fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.key)
    }
}

/// Account locator as used in JWT claims: the part before the first `.`, uppercased.
pub fn account_identifier(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => Path::new(p).to_path_buf(),
    }
}
