// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Short-lived access-credential cache shared by the OAuth-style providers.
//!
//! One broker instance belongs to one client handle. Each provider gets a
//! slot guarded by an async mutex: concurrent callers needing a credential
//! for the same provider queue on the slot, so at most one acquisition is in
//! flight per provider and the queued callers observe the winner's freshly
//! cached credential without issuing their own remote request. A failed
//! acquisition caches nothing — a previously cached, still-valid credential
//! stays usable and an empty slot stays empty, so the next call after the
//! fault is corrected succeeds without restarting anything.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};
use tokio::sync::Mutex;

use crate::plugins::KmsProvider;
use crate::Result;

/// Margin under which a credential is treated as already expired, so a token
/// about to lapse is not handed to a request that will outlive it.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, Debug)]
pub struct Credential {
    pub provider: KmsProvider,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(EXPIRY_SKEW_SECS) > now
    }
}

#[derive(Default)]
pub struct TokenBroker {
    slots: StdMutex<HashMap<KmsProvider, Arc<Mutex<Option<Credential>>>>>,
}

impl TokenBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, provider: KmsProvider) -> Arc<Mutex<Option<Credential>>> {
        let mut slots = self.slots.lock().expect("broker slot map lock");
        slots.entry(provider).or_default().clone()
    }

    /// Return the cached credential for `provider` if it is still valid,
    /// otherwise run `fetch` and cache its result. Concurrent callers for
    /// one provider coalesce on the slot lock.
    pub async fn acquire<F, Fut>(&self, provider: KmsProvider, fetch: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        let slot = self.slot(provider);
        let mut guard = slot.lock().await;

        if let Some(credential) = guard.as_ref() {
            if credential.is_valid_at(Utc::now()) {
                debug!("reuse cached {} credential", provider.as_ref());
                return Ok(credential.clone());
            }
        }

        // Failure propagates without touching the slot.
        let credential = fetch().await?;
        info!(
            "acquired {} credential valid until {}",
            provider.as_ref(),
            credential.expires_at
        );
        *guard = Some(credential.clone());
        Ok(credential)
    }

    /// Drop the cached credential for `provider`, forcing the next acquire
    /// to go remote.
    pub async fn invalidate(&self, provider: KmsProvider) {
        let slot = self.slot(provider);
        *slot.lock().await = None;
    }
}
