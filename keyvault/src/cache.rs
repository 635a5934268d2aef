// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Per-session cache of unwrapped data keys.
//!
//! Each client handle owns exactly one cache; caches are never shared across
//! handles and never persisted, so two handles over the same vault can hold
//! diverging views of a key after its server-side material changes. That
//! divergence surfaces as a decrypt-time integrity failure, never as wrong
//! plaintext. An entry is inserted only after a successful unwrap — a failed
//! unwrap leaves the map untouched.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::Mutex;
use uuid::Uuid;
use zeroize::Zeroizing;

struct CacheEntry {
    key: Zeroizing<Vec<u8>>,
    #[allow(dead_code)]
    inserted_at: Instant,
}

#[derive(Default)]
pub struct DekCache {
    entries: Mutex<HashMap<Uuid, CacheEntry>>,
}

impl DekCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, dek_id: Uuid) -> Option<Zeroizing<Vec<u8>>> {
        self.entries
            .lock()
            .await
            .get(&dek_id)
            .map(|entry| entry.key.clone())
    }

    /// Insert the unwrapped key, keeping the existing entry if a concurrent
    /// miss won the race. Returns the key that ended up cached so both racers
    /// converge on the same material.
    pub async fn insert(&self, dek_id: Uuid, key: Zeroizing<Vec<u8>>) -> Zeroizing<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(dek_id)
            .or_insert_with(|| CacheEntry {
                key,
                inserted_at: Instant::now(),
            })
            .key
            .clone()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
