// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer-token authentication (§4.5) and wildcard permission resolution
//! (§4.4).

pub mod permission;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use vss_error::BrokerError;

pub use permission::{AccessMode, PermissionMap};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    exp: i64,
    #[serde(rename = "kuksa-vss", default)]
    permissions: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "modifyTree", default)]
    modify_tree: bool,
}

/// A token's resolved, ready-to-use grant: who they are, what they can
/// read/write, whether they can reshape the tree, and until when.
pub struct Session {
    pub subject: String,
    pub permissions: PermissionMap,
    pub modify_tree: bool,
    pub expires_at: i64,
}

impl Session {
    /// `true` if the session's token has not yet expired.
    pub fn is_still_valid(&self) -> bool {
        now_unix() < self.expires_at
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Verifies RS256-signed bearer tokens against a hot-swappable public key
/// (§4.5: "public key may be rotated without restarting the broker").
pub struct Authenticator {
    public_key_pem: RwLock<Vec<u8>>,
}

impl Authenticator {
    pub fn new(public_key_pem: Vec<u8>) -> Self {
        Authenticator {
            public_key_pem: RwLock::new(public_key_pem),
        }
    }

    /// Replace the public key used to verify subsequently presented tokens.
    /// Already-issued [`Session`]s are unaffected.
    pub fn update_public_key(&self, public_key_pem: Vec<u8>) {
        *self.public_key_pem.write().expect("key lock poisoned") = public_key_pem;
        tracing::info!("authenticator public key rotated");
    }

    /// Verify a bearer token's signature and expiry, and resolve its
    /// permission map into a [`Session`].
    pub fn validate(&self, token: &str) -> Result<Session, BrokerError> {
        let pem = self.public_key_pem.read().expect("key lock poisoned");
        let key = DecodingKey::from_rsa_pem(&pem)
            .map_err(|e| BrokerError::InvalidToken(format!("malformed public key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| BrokerError::InvalidToken(format!("token rejected: {e}")))?;

        let permissions = PermissionMap::from_claims(&data.claims.permissions)?;
        Ok(Session {
            subject: data.claims.sub.unwrap_or_default(),
            permissions,
            modify_tree: data.claims.modify_tree,
            expires_at: data.claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_token() {
        let auth = Authenticator::new(b"not a real pem".to_vec());
        assert!(matches!(
            auth.validate("not.a.jwt"),
            Err(BrokerError::InvalidToken(_))
        ));
    }

    #[test]
    fn session_expiry_is_checked_against_wall_clock() {
        let session = Session {
            subject: "tester".into(),
            permissions: PermissionMap::empty(),
            modify_tree: false,
            expires_at: now_unix() - 10,
        };
        assert!(!session.is_still_valid());
    }
}
