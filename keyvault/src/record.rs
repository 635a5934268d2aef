// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Persisted data-key records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kms::MasterKey;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Enabled,
    Disabled,
}

/// One data encryption key as stored in the vault.
///
/// `key_material` holds the key in wrapped form only; plaintext key material
/// never reaches the store. `id` is assigned at creation and immutable.
/// Records are mutated only to manage alternate names and status, and are
/// never physically deleted by this crate.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DataKeyRecord {
    pub id: Uuid,

    #[serde_as(as = "Base64")]
    pub key_material: Vec<u8>,

    pub creation_date: DateTime<Utc>,

    pub update_date: DateTime<Utc>,

    pub status: KeyStatus,

    pub master_key: MasterKey,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub key_alt_names: BTreeSet<String>,
}

impl DataKeyRecord {
    pub fn new(master_key: MasterKey, wrapped_key: Vec<u8>, alt_names: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key_material: wrapped_key,
            creation_date: now,
            update_date: now,
            status: KeyStatus::Enabled,
            master_key,
            key_alt_names: alt_names.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == KeyStatus::Enabled
    }

    /// Returns whether the name was newly added.
    pub fn add_alt_name(&mut self, name: &str) -> bool {
        let added = self.key_alt_names.insert(name.to_string());
        if added {
            self.update_date = Utc::now();
        }
        added
    }

    /// Returns whether the name was present.
    pub fn remove_alt_name(&mut self, name: &str) -> bool {
        let removed = self.key_alt_names.remove(name);
        if removed {
            self.update_date = Utc::now();
        }
        removed
    }

    pub fn set_status(&mut self, status: KeyStatus) {
        if self.status != status {
            self.status = status;
            self.update_date = Utc::now();
        }
    }
}
