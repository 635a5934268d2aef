// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Key vault persistence interface.
//!
//! The real vault lives in an external document store; this crate only
//! consumes it as a keyed record store through [`VaultStore`]. The in-memory
//! implementation backs the tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::DataKeyRecord;
use crate::{Error, Result};

#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Persist a new record. Fails without side effect if the id or one of
    /// the alternate names is already taken.
    async fn insert(&self, record: DataKeyRecord) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DataKeyRecord>>;

    async fn find_by_alt_name(&self, name: &str) -> Result<Vec<DataKeyRecord>>;

    async fn list(&self) -> Result<Vec<DataKeyRecord>>;

    /// Replace an existing record, keyed by its id.
    async fn update(&self, record: DataKeyRecord) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryVaultStore {
    records: RwLock<HashMap<Uuid, DataKeyRecord>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alt_name_taken(
        records: &HashMap<Uuid, DataKeyRecord>,
        record: &DataKeyRecord,
    ) -> Option<String> {
        records
            .values()
            .filter(|existing| existing.id != record.id)
            .flat_map(|existing| existing.key_alt_names.iter())
            .find(|name| record.key_alt_names.contains(*name))
            .cloned()
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn insert(&self, record: DataKeyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(Error::Store(format!(
                "data key {} already exists",
                record.id
            )));
        }
        if let Some(name) = Self::alt_name_taken(&records, &record) {
            return Err(Error::DuplicateKeyAltName(name));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DataKeyRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_alt_name(&self, name: &str) -> Result<Vec<DataKeyRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.key_alt_names.contains(name))
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<DataKeyRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn update(&self, record: DataKeyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id) {
            return Err(Error::KeyNotFound(record.id));
        }
        if let Some(name) = Self::alt_name_taken(&records, &record) {
            return Err(Error::DuplicateKeyAltName(name));
        }
        records.insert(record.id, record);
        Ok(())
    }
}
