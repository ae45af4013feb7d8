// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-code enrollment flow.
//!
//! A probe displays a short human-readable code; an already-authenticated
//! user confirms it in the browser; the probe polls until a bearer token is
//! issued. The device never hosts a local HTTP listener.

use linkmap_core::types::DeviceAuthStatus;
use linkmap_core::LinkmapError;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use tracing::info;

use crate::bridge::ProbeBridge;

/// User-code alphabet: unambiguous, excludes I, O, 0, 1. Exactly 32
/// symbols, so a random byte maps to a symbol with a 5-bit mask.
const USER_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Device-auth request lifetime.
const EXPIRES_IN_SECS: u64 = 900;

/// Suggested probe poll cadence.
const POLL_INTERVAL_SECS: u64 = 5;

/// Bearer token prefix for probe devices.
const TOKEN_PREFIX: &str = "lmp_";

/// Response to a new enrollment request.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAuthGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Outcome of a token poll.
#[derive(Debug, Clone)]
pub enum TokenPoll {
    /// Not yet authorized; keep polling.
    Pending,
    /// The request expired; restart enrollment.
    Expired,
    /// Unknown device code.
    Invalid,
    /// Authorized: a device was minted.
    Granted { access_token: String, user_id: i64 },
}

impl ProbeBridge {
    /// Start an enrollment: generates the codes, stores the request, and
    /// returns what the probe should display and poll with.
    pub async fn initiate_device_auth(
        &self,
        web_base_url: &str,
    ) -> Result<DeviceAuthGrant, LinkmapError> {
        let device_code = hex::encode(random_bytes::<16>()?);
        let user_code = generate_user_code()?;
        let expires_at = (chrono::Utc::now()
            + chrono::Duration::seconds(EXPIRES_IN_SECS as i64))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();

        self.store()
            .create_device_auth(&device_code, &user_code, &expires_at)
            .await?;
        info!(user_code = user_code.as_str(), "device enrollment initiated");

        Ok(DeviceAuthGrant {
            device_code,
            user_code,
            verification_uri: format!("{}/auth/device", web_base_url.trim_end_matches('/')),
            expires_in: EXPIRES_IN_SECS,
            interval: POLL_INTERVAL_SECS,
        })
    }

    /// Poll an enrollment by device code.
    ///
    /// On `authorized`, mints a new probe device with a fresh `lmp_` bearer
    /// token. The request row stays authorized; probes stop polling after
    /// the first grant.
    pub async fn poll_device_token(&self, device_code: &str) -> Result<TokenPoll, LinkmapError> {
        let Some(auth) = self.store().get_device_auth(device_code).await? else {
            return Ok(TokenPoll::Invalid);
        };

        if auth.status == DeviceAuthStatus::Expired {
            return Ok(TokenPoll::Expired);
        }
        if auth.expires_at < linkmap_storage::now_iso() {
            self.store().expire_device_auth(device_code).await?;
            return Ok(TokenPoll::Expired);
        }

        match auth.status {
            DeviceAuthStatus::Pending => Ok(TokenPoll::Pending),
            DeviceAuthStatus::Authorized => {
                let user_id = auth.user_id.ok_or_else(|| {
                    LinkmapError::Internal("authorized request without a user".to_string())
                })?;
                let device_id = uuid::Uuid::new_v4().to_string();
                let access_token = format!("{TOKEN_PREFIX}{}", hex::encode(random_bytes::<16>()?));
                self.store()
                    .create_probe_device(&device_id, user_id, &access_token, None)
                    .await?;
                info!(user_id, device_id = device_id.as_str(), "probe device enrolled");
                Ok(TokenPoll::Granted {
                    access_token,
                    user_id,
                })
            }
            DeviceAuthStatus::Expired => Ok(TokenPoll::Expired),
        }
    }

    /// Authorize a user code on behalf of a logged-in user.
    pub async fn authorize_user_code(
        &self,
        user_code: &str,
        user_id: i64,
    ) -> Result<(), LinkmapError> {
        let Some(auth) = self.store().get_device_auth_by_user_code(user_code).await? else {
            return Err(LinkmapError::NotFound(format!("user code {user_code}")));
        };

        if auth.status == DeviceAuthStatus::Expired || auth.expires_at < linkmap_storage::now_iso()
        {
            self.store().expire_device_auth(&auth.device_code).await?;
            return Err(LinkmapError::Validation("code expired".to_string()));
        }

        self.store()
            .authorize_device_auth(&auth.device_code, user_id)
            .await?;
        info!(user_id, user_code, "device code authorized");
        Ok(())
    }
}

/// Generate an 8-character user code formatted `XXXX-XXXX`.
fn generate_user_code() -> Result<String, LinkmapError> {
    let bytes = random_bytes::<8>()?;
    let mut code = String::with_capacity(9);
    for (i, byte) in bytes.iter().enumerate() {
        if i == 4 {
            code.push('-');
        }
        // 32-symbol alphabet: the low 5 bits index it uniformly.
        code.push(USER_CODE_ALPHABET[(byte & 0x1f) as usize] as char);
    }
    Ok(code)
}

fn random_bytes<const N: usize>() -> Result<[u8; N], LinkmapError> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; N];
    rng.fill(&mut buf)
        .map_err(|_| LinkmapError::Internal("system RNG failure".to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmap_storage::Store;
    use std::sync::Arc;

    async fn setup() -> (Arc<Store>, ProbeBridge, i64) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user_id = store.create_user("tg-1", None).await.unwrap();
        let bridge = ProbeBridge::new(store.clone());
        (store, bridge, user_id)
    }

    fn assert_user_code_shape(code: &str) {
        assert_eq!(code.len(), 9);
        let halves: Vec<&str> = code.split('-').collect();
        assert_eq!(halves.len(), 2);
        for half in halves {
            assert_eq!(half.len(), 4);
            for c in half.bytes() {
                assert!(
                    USER_CODE_ALPHABET.contains(&c),
                    "character {} outside the unambiguous alphabet",
                    c as char
                );
            }
        }
    }

    #[test]
    fn user_codes_avoid_ambiguous_characters() {
        for _ in 0..64 {
            let code = generate_user_code().unwrap();
            assert_user_code_shape(&code);
            for banned in ['I', 'O', '0', '1'] {
                assert!(!code.contains(banned), "code {code} contains {banned}");
            }
        }
    }

    #[tokio::test]
    async fn initiate_produces_grant() {
        let (_store, bridge, _user) = setup().await;
        let grant = bridge
            .initiate_device_auth("https://links.example.com/")
            .await
            .unwrap();

        assert_eq!(grant.device_code.len(), 32);
        assert!(grant.device_code.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_user_code_shape(&grant.user_code);
        assert_eq!(grant.verification_uri, "https://links.example.com/auth/device");
        assert_eq!(grant.expires_in, 900);
        assert_eq!(grant.interval, 5);
    }

    #[tokio::test]
    async fn full_enrollment_flow() {
        let (_store, bridge, user_id) = setup().await;
        let grant = bridge
            .initiate_device_auth("https://links.example.com")
            .await
            .unwrap();

        // Before authorization, polls are pending.
        let poll = bridge.poll_device_token(&grant.device_code).await.unwrap();
        assert!(matches!(poll, TokenPoll::Pending));

        // A logged-in user authorizes the code.
        bridge.authorize_user_code(&grant.user_code, user_id).await.unwrap();

        // The next poll grants a token.
        let poll = bridge.poll_device_token(&grant.device_code).await.unwrap();
        let (access_token, granted_user) = match poll {
            TokenPoll::Granted {
                access_token,
                user_id,
            } => (access_token, user_id),
            other => panic!("expected Granted, got {other:?}"),
        };
        assert_eq!(granted_user, user_id);
        assert!(access_token.starts_with("lmp_"));
        assert_eq!(access_token.len(), 4 + 32);
        // lmp_ followed by 32 lowercase hex characters.
        assert!(access_token[4..]
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));

        // The token authenticates the device.
        let device = bridge
            .store()
            .get_probe_device_by_token(&access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.user_id, user_id);
    }

    #[tokio::test]
    async fn unknown_device_code_is_invalid() {
        let (_store, bridge, _user) = setup().await;
        let poll = bridge.poll_device_token("ffffffffffffffff").await.unwrap();
        assert!(matches!(poll, TokenPoll::Invalid));
    }

    #[tokio::test]
    async fn expired_request_reports_expired_token() {
        let (store, bridge, user_id) = setup().await;
        store
            .create_device_auth("deadbeef", "ABCD-EFGH", "2020-01-01T00:00:00.000Z")
            .await
            .unwrap();

        let poll = bridge.poll_device_token("deadbeef").await.unwrap();
        assert!(matches!(poll, TokenPoll::Expired));

        // Authorizing an expired code fails too.
        let err = bridge.authorize_user_code("ABCD-EFGH", user_id).await.unwrap_err();
        assert!(matches!(err, LinkmapError::Validation(_)));
    }

    #[tokio::test]
    async fn authorize_unknown_code_is_not_found() {
        let (_store, bridge, user_id) = setup().await;
        let err = bridge.authorize_user_code("ZZZZ-ZZZZ", user_id).await.unwrap_err();
        assert!(matches!(err, LinkmapError::NotFound(_)));
    }
}
