// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Envelope encryption engine.
//!
//! One [`KeyVaultClient`] is one logical session: it owns its own unwrapped
//! key cache and its own credential broker, both created fresh with the
//! handle. Two handles over the same vault share persisted records but no
//! transient state.

use std::str::FromStr;
use std::sync::Arc;

use crypto::EncryptionAlgorithm;
use log::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use kms::{new_key_ops, KeyOps, KmsCredentials, KmsProvider, MasterKey, TokenBroker, Transport};

use crate::cache::DekCache;
use crate::envelope::Envelope;
use crate::record::{DataKeyRecord, KeyStatus};
use crate::store::VaultStore;
use crate::{Error, Result};

pub struct KeyVaultClient {
    store: Arc<dyn VaultStore>,
    transport: Arc<dyn Transport>,
    credentials: KmsCredentials,
    broker: Arc<TokenBroker>,
    cache: DekCache,
}

impl KeyVaultClient {
    pub fn new(
        store: Arc<dyn VaultStore>,
        transport: Arc<dyn Transport>,
        credentials: KmsCredentials,
    ) -> Self {
        Self {
            store,
            transport,
            credentials,
            broker: Arc::new(TokenBroker::new()),
            cache: DekCache::new(),
        }
    }

    fn key_ops(&self, master_key: &MasterKey) -> Result<Box<dyn KeyOps>> {
        Ok(new_key_ops(
            master_key,
            &self.credentials,
            self.transport.clone(),
            self.broker.clone(),
        )?)
    }

    /// Generate a data key, wrap it under `master_key` and persist the
    /// record. Any wrap, auth or store failure propagates unchanged and
    /// leaves zero persisted records and zero cache entries behind.
    pub async fn create_data_key(
        &self,
        master_key: MasterKey,
        alt_names: Vec<String>,
    ) -> Result<Uuid> {
        let ops = self.key_ops(&master_key)?;
        let dek = crypto::generate_data_key();
        let wrapped = ops.wrap(&dek).await?;

        let record = DataKeyRecord::new(master_key, wrapped, alt_names);
        let id = record.id;
        self.store.insert(record).await?;
        info!("created data key {id} under {}", ops.describe());
        Ok(id)
    }

    /// Produce the plaintext of `dek_id`, unwrapping through the provider on
    /// the first use in this session. A failed unwrap caches nothing.
    async fn resolve(&self, dek_id: Uuid) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(key) = self.cache.get(dek_id).await {
            return Ok(key);
        }

        let record = self
            .store
            .find_by_id(dek_id)
            .await?
            .ok_or(Error::KeyNotFound(dek_id))?;
        if !record.is_enabled() {
            return Err(Error::KeyDisabled(dek_id));
        }

        let ops = self.key_ops(&record.master_key)?;
        let key = ops.unwrap(&record.key_material).await?;
        Ok(self.cache.insert(dek_id, key).await)
    }

    /// Encrypt `plaintext` under the data key `dek_id` with the selected
    /// algorithm, embedding both in the ciphertext envelope.
    pub async fn encrypt(&self, dek_id: Uuid, plaintext: &[u8], algorithm: &str) -> Result<Vec<u8>> {
        let algorithm = EncryptionAlgorithm::from_str(algorithm)
            .map_err(|_| Error::UnknownAlgorithm(algorithm.to_string()))?;

        let key = self.resolve(dek_id).await?;
        let header = Envelope::header(dek_id, algorithm);
        let payload = crypto::encrypt(&key, plaintext, &header, algorithm)?;

        Ok(Envelope {
            dek_id,
            algorithm,
            payload,
        }
        .to_bytes())
    }

    /// Decrypt a ciphertext envelope. A stale cached key, rotated
    /// server-side material or a tampered payload all fail the cipher's
    /// integrity check ([`Error::IntegrityFailure`]); wrong plaintext is
    /// never returned silently.
    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let envelope = Envelope::parse(ciphertext)?;
        let key = self.resolve(envelope.dek_id).await?;
        let header = Envelope::header(envelope.dek_id, envelope.algorithm);
        Ok(crypto::decrypt(&key, &envelope.payload, &header)?)
    }

    pub async fn get_key(&self, id: Uuid) -> Result<DataKeyRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(Error::KeyNotFound(id))
    }

    pub async fn get_keys_by_alt_name(&self, name: &str) -> Result<Vec<DataKeyRecord>> {
        self.store.find_by_alt_name(name).await
    }

    pub async fn list_keys(&self) -> Result<Vec<DataKeyRecord>> {
        self.store.list().await
    }

    pub async fn add_key_alt_name(&self, id: Uuid, name: &str) -> Result<DataKeyRecord> {
        let mut record = self.get_key(id).await?;
        record.add_alt_name(name);
        self.store.update(record.clone()).await?;
        Ok(record)
    }

    pub async fn remove_key_alt_name(&self, id: Uuid, name: &str) -> Result<DataKeyRecord> {
        let mut record = self.get_key(id).await?;
        record.remove_alt_name(name);
        self.store.update(record.clone()).await?;
        Ok(record)
    }

    pub async fn set_key_status(&self, id: Uuid, status: KeyStatus) -> Result<DataKeyRecord> {
        let mut record = self.get_key(id).await?;
        record.set_status(status);
        self.store.update(record.clone()).await?;
        Ok(record)
    }

    /// The session's unwrapped-key cache.
    pub fn dek_cache(&self) -> &DekCache {
        &self.cache
    }

    /// Drop a cached provider credential, forcing reacquisition on the next
    /// remote key operation.
    pub async fn invalidate_credential(&self, provider: KmsProvider) {
        self.broker.invalidate(provider).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::KeyVaultClient;
    use crate::record::{DataKeyRecord, KeyStatus};
    use crate::store::{MemoryVaultStore, VaultStore};
    use crate::Error;
    use kms::plugins::local::{LocalCredentials, LocalKmsClient};
    use kms::{HttpRequest, HttpResponse, KeyOps, KmsCredentials, MasterKey, Transport};

    const RANDOM: &str = "AEAD_AES_256_GCM-Random";
    const DETERMINISTIC: &str = "AEAD_AES_256_GCM-Deterministic";

    const LOCAL_MASTER_KEY: [u8; 96] = [0x4B; 96];

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&self, _request: HttpRequest) -> kms::Result<HttpResponse> {
            Err(kms::Error::Transport("no transport in this test".into()))
        }
    }

    fn local_credentials() -> KmsCredentials {
        KmsCredentials {
            local: Some(LocalCredentials::from_key_material(&LOCAL_MASTER_KEY)),
            ..KmsCredentials::default()
        }
    }

    fn client(store: Arc<dyn VaultStore>) -> KeyVaultClient {
        KeyVaultClient::new(store, Arc::new(NullTransport), local_credentials())
    }

    #[tokio::test]
    async fn encrypt_decrypt_roundtrip() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);

        let id = client
            .create_data_key(MasterKey::Local, vec!["mongoKey".into()])
            .await
            .expect("create key");

        let ciphertext = client.encrypt(id, b"mongo", RANDOM).await.expect("encrypt");
        let plaintext = client.decrypt(&ciphertext).await.expect("decrypt");
        assert_eq!(&plaintext[..], b"mongo");
    }

    #[tokio::test]
    async fn deterministic_ciphertexts_are_equal_random_are_not() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);
        let id = client
            .create_data_key(MasterKey::Local, vec![])
            .await
            .unwrap();

        let a = client.encrypt(id, b"value", DETERMINISTIC).await.unwrap();
        let b = client.encrypt(id, b"value", DETERMINISTIC).await.unwrap();
        assert_eq!(a, b);

        let c = client.encrypt(id, b"value", RANDOM).await.unwrap();
        let d = client.encrypt(id, b"value", RANDOM).await.unwrap();
        assert_ne!(c, d);
    }

    #[tokio::test]
    async fn unknown_algorithm_selector_is_rejected() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);
        let id = client
            .create_data_key(MasterKey::Local, vec![])
            .await
            .unwrap();

        let err = client
            .encrypt(id, b"value", "AEAD_AES_256_CBC_HMAC_SHA_512-Random")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(_)));
    }

    #[tokio::test]
    async fn unknown_key_id_is_not_found() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);

        let err = client
            .encrypt(Uuid::new_v4(), b"value", RANDOM)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(_)));
    }

    #[tokio::test]
    async fn disabled_key_is_refused() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);
        let id = client
            .create_data_key(MasterKey::Local, vec![])
            .await
            .unwrap();

        client
            .set_key_status(id, KeyStatus::Disabled)
            .await
            .expect("disable");

        let err = client.encrypt(id, b"value", RANDOM).await.unwrap_err();
        assert!(matches!(err, Error::KeyDisabled(_)));
    }

    #[tokio::test]
    async fn duplicate_alt_name_creates_nothing() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);

        client
            .create_data_key(MasterKey::Local, vec!["mongoKey".into()])
            .await
            .expect("first key");

        let err = client
            .create_data_key(MasterKey::Local, vec!["mongoKey".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKeyAltName(_)));

        assert_eq!(client.list_keys().await.unwrap().len(), 1);
        assert_eq!(
            client.get_keys_by_alt_name("mongoKey").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn alt_name_management() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);
        let id = client
            .create_data_key(MasterKey::Local, vec!["mongoKey".into()])
            .await
            .unwrap();

        client.add_key_alt_name(id, "backupKey").await.expect("add");
        assert_eq!(
            client.get_keys_by_alt_name("backupKey").await.unwrap().len(),
            1
        );

        client
            .remove_key_alt_name(id, "mongoKey")
            .await
            .expect("remove");
        assert!(client
            .get_keys_by_alt_name("mongoKey")
            .await
            .unwrap()
            .is_empty());
    }

    /// Store wrapper counting id lookups, to observe cache hits.
    struct CountingStore {
        inner: MemoryVaultStore,
        id_lookups: AtomicUsize,
    }

    #[async_trait]
    impl VaultStore for CountingStore {
        async fn insert(&self, record: DataKeyRecord) -> crate::Result<()> {
            self.inner.insert(record).await
        }

        async fn find_by_id(&self, id: Uuid) -> crate::Result<Option<DataKeyRecord>> {
            self.id_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_id(id).await
        }

        async fn find_by_alt_name(&self, name: &str) -> crate::Result<Vec<DataKeyRecord>> {
            self.inner.find_by_alt_name(name).await
        }

        async fn list(&self) -> crate::Result<Vec<DataKeyRecord>> {
            self.inner.list().await
        }

        async fn update(&self, record: DataKeyRecord) -> crate::Result<()> {
            self.inner.update(record).await
        }
    }

    #[tokio::test]
    async fn cache_short_circuits_unwrap_after_first_use() {
        let store = Arc::new(CountingStore {
            inner: MemoryVaultStore::new(),
            id_lookups: AtomicUsize::new(0),
        });
        let client = client(store.clone());
        let id = client
            .create_data_key(MasterKey::Local, vec![])
            .await
            .unwrap();

        assert!(client.dek_cache().is_empty().await);
        client.encrypt(id, b"one", RANDOM).await.unwrap();
        assert_eq!(client.dek_cache().len().await, 1);

        client.encrypt(id, b"two", RANDOM).await.unwrap();
        client.encrypt(id, b"three", RANDOM).await.unwrap();
        assert_eq!(store.id_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_cache_after_key_rotation_fails_decrypt() {
        let store = Arc::new(MemoryVaultStore::new());

        let warm_session = client(store.clone());
        let id = warm_session
            .create_data_key(MasterKey::Local, vec!["mongoKey".into()])
            .await
            .unwrap();
        let before_rotation = warm_session
            .encrypt(id, b"mongo", RANDOM)
            .await
            .expect("encrypt warms the cache");

        // Server-side rotation: replace the record's wrapped material with a
        // different data key wrapped under the same master key.
        let local = LocalKmsClient::new(&LocalCredentials::from_key_material(&LOCAL_MASTER_KEY))
            .expect("local kms");
        let rotated = local
            .wrap(&crypto::generate_data_key())
            .await
            .expect("wrap rotated key");
        let mut record = store.find_by_id(id).await.unwrap().unwrap();
        record.key_material = rotated;
        store.update(record).await.expect("rotate");

        // A clean-cache session unwraps the rotated key and must fail the
        // integrity check on old ciphertext instead of producing garbage.
        let clean_session = client(store.clone());
        let err = clean_session.decrypt(&before_rotation).await.unwrap_err();
        assert!(matches!(err, Error::IntegrityFailure));

        // Ciphertext produced after the rotation is unreadable through the
        // stale cached key of the warm session.
        let after_rotation = clean_session
            .encrypt(id, b"mongo", RANDOM)
            .await
            .expect("encrypt with rotated key");
        let err = warm_session.decrypt(&after_rotation).await.unwrap_err();
        assert!(matches!(err, Error::IntegrityFailure));

        // The warm session still reads its own pre-rotation ciphertext.
        let plaintext = warm_session.decrypt(&before_rotation).await.unwrap();
        assert_eq!(&plaintext[..], b"mongo");
    }

    #[tokio::test]
    async fn tampered_envelope_fails_integrity_check() {
        let store = Arc::new(MemoryVaultStore::new());
        let client = client(store);
        let id = client
            .create_data_key(MasterKey::Local, vec![])
            .await
            .unwrap();

        let mut ciphertext = client.encrypt(id, b"mongo", RANDOM).await.unwrap();

        // Rewriting the algorithm tag leaves a parseable envelope whose
        // header no longer matches the payload's associated data.
        ciphertext[17] = 1;
        let err = client.decrypt(&ciphertext).await.unwrap_err();
        assert!(matches!(err, Error::IntegrityFailure));

        let mut truncated = client.encrypt(id, b"mongo", RANDOM).await.unwrap();
        truncated.truncate(10);
        let err = client.decrypt(&truncated).await.unwrap_err();
        assert!(matches!(err, Error::MalformedCiphertext(_)));
    }
}
