// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `linkmap-probe login`: the device-code flow from the probe's side.

use std::time::Duration;

use linkmap_core::LinkmapError;
use tracing::debug;

use crate::api::{self, TokenPoll};
use crate::config::{ProbeConfig, StateDir};

/// Run the device-code flow and persist the resulting token.
pub async fn run_login(api_base: &str, state: &StateDir) -> Result<(), LinkmapError> {
    state.ensure()?;

    let grant = api::initiate_device_auth(api_base).await?;
    println!("To connect this probe, open:\n\n    {}\n", grant.verification_uri);
    println!("and enter the code:\n\n    {}\n", grant.user_code);
    println!("Waiting for authorization (expires in {} minutes)...", grant.expires_in / 60);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(grant.expires_in);
    loop {
        tokio::time::sleep(Duration::from_secs(grant.interval.max(1))).await;

        match api::poll_device_token(api_base, &grant.device_code).await? {
            TokenPoll::Granted {
                access_token,
                user_id,
            } => {
                let mut config = ProbeConfig::load(&state.config_path())?
                    .unwrap_or_else(|| ProbeConfig::new(api_base.to_string()));
                config.api_base = api_base.trim_end_matches('/').to_string();
                config.access_token = Some(access_token);
                config.user_id = Some(user_id);
                config.save(&state.config_path())?;

                println!("Probe connected (user {user_id}).");
                println!("Start it with: linkmap-probe run");
                return Ok(());
            }
            TokenPoll::Pending => {
                debug!("authorization pending");
                if tokio::time::Instant::now() >= deadline {
                    return Err(LinkmapError::Timeout {
                        duration: Duration::from_secs(grant.expires_in),
                    });
                }
            }
            TokenPoll::Expired => {
                return Err(LinkmapError::Validation(
                    "enrollment code expired; run login again".to_string(),
                ));
            }
            TokenPoll::Invalid => {
                return Err(LinkmapError::Validation(
                    "coordinator rejected the device code".to_string(),
                ));
            }
        }
    }
}

/// Clear the stored token.
pub fn run_logout(state: &StateDir) -> Result<(), LinkmapError> {
    let Some(mut config) = ProbeConfig::load(&state.config_path())? else {
        println!("No probe configuration found; nothing to do.");
        return Ok(());
    };
    config.access_token = None;
    config.user_id = None;
    config.save(&state.config_path())?;
    println!("Token cleared. Run `linkmap-probe login` to reconnect.");
    Ok(())
}
