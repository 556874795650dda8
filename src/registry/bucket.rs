//! # Bucket Registry
//!
//! Domains and their buckets. Records are persisted through the key-value
//! substrate and cached in memory; the cache is rebuilt from the substrate
//! when the registry is opened.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{RegistryError, RegistryResult};
use super::kind::BucketKind;
use crate::storage::{keys, KeyValueStore, StorageError};

const DOMAIN_ROOT: &str = "domain";
const BUCKET_ROOT: &str = "bucket";

/// A registered domain (tenant namespace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A bucket within a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub domain: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BucketKind,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an idempotent create
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created<T> {
    New(T),
    Existing(T),
}

impl<T> Created<T> {
    pub fn into_inner(self) -> T {
        match self {
            Created::New(v) | Created::Existing(v) => v,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Created::New(_))
    }
}

/// Parse a bucket spec body (`{"type": "pagecontent"}`) into a kind.
pub fn parse_bucket_spec(body: &[u8]) -> RegistryResult<BucketKind> {
    if body.is_empty() {
        return Err(RegistryError::InvalidSpec("empty body".into()));
    }
    let spec: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RegistryError::InvalidSpec(format!("not JSON: {}", e)))?;
    let object = spec
        .as_object()
        .ok_or_else(|| RegistryError::InvalidSpec("expected a JSON object".into()))?;
    let kind_name = object
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RegistryError::InvalidSpec("missing 'type'".into()))?;
    BucketKind::parse(kind_name)
        .ok_or_else(|| RegistryError::InvalidSpec(format!("unknown type '{}'", kind_name)))
}

fn validate_name(what: &str, name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName(format!("{} name is empty", what)));
    }
    if name.contains('/') {
        return Err(RegistryError::InvalidName(format!(
            "{} name '{}' contains '/'",
            what, name
        )));
    }
    Ok(())
}

fn decode<T: for<'de> Deserialize<'de>>(key: &str, value: &[u8]) -> RegistryResult<T> {
    serde_json::from_slice(value).map_err(|e| {
        RegistryError::Storage(StorageError::corruption_for_key(
            key,
            format!("Undecodable registry record: {}", e),
        ))
    })
}

fn encode<T: Serialize>(key: &str, record: &T) -> RegistryResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        RegistryError::Storage(StorageError::write_failed(
            format!("Failed to encode registry record '{}'", key),
            e.into(),
        ))
    })
}

#[derive(Default)]
struct Cache {
    domains: HashMap<String, DomainRecord>,
    buckets: HashMap<(String, String), BucketRecord>,
}

/// Registry of domains and buckets
pub struct BucketRegistry {
    store: Arc<dyn KeyValueStore>,
    cache: RwLock<Cache>,
}

impl BucketRegistry {
    /// Open the registry over `store`, loading every persisted record.
    pub fn open(store: Arc<dyn KeyValueStore>) -> RegistryResult<Self> {
        let mut cache = Cache::default();

        for (key, value) in store.scan(&format!("{}/", DOMAIN_ROOT))? {
            let record: DomainRecord = decode(&key, &value)?;
            cache.domains.insert(record.name.clone(), record);
        }
        for (key, value) in store.scan(&format!("{}/", BUCKET_ROOT))? {
            let record: BucketRecord = decode(&key, &value)?;
            cache
                .buckets
                .insert((record.domain.clone(), record.name.clone()), record);
        }

        Ok(Self {
            store,
            cache: RwLock::new(cache),
        })
    }

    fn poisoned() -> RegistryError {
        RegistryError::Storage(StorageError::lock_poisoned())
    }

    /// Create a domain. Creating an existing domain succeeds unchanged.
    pub fn create_domain(&self, name: &str) -> RegistryResult<Created<DomainRecord>> {
        validate_name("domain", name)?;

        let mut cache = self.cache.write().map_err(|_| Self::poisoned())?;
        if let Some(existing) = cache.domains.get(name) {
            return Ok(Created::Existing(existing.clone()));
        }

        let record = DomainRecord {
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let key = keys::key_path(&[DOMAIN_ROOT, name]);
        self.store.put(&key, &encode(&key, &record)?)?;
        cache.domains.insert(name.to_string(), record.clone());
        Ok(Created::New(record))
    }

    /// Create a bucket in an existing domain.
    ///
    /// Re-creating with the same kind succeeds unchanged; a different kind is
    /// a conflict.
    pub fn create_bucket(
        &self,
        domain: &str,
        bucket: &str,
        kind: BucketKind,
    ) -> RegistryResult<Created<BucketRecord>> {
        validate_name("bucket", bucket)?;

        let mut cache = self.cache.write().map_err(|_| Self::poisoned())?;
        if !cache.domains.contains_key(domain) {
            return Err(RegistryError::DomainNotFound(domain.to_string()));
        }

        let cache_key = (domain.to_string(), bucket.to_string());
        if let Some(existing) = cache.buckets.get(&cache_key) {
            if existing.kind == kind {
                return Ok(Created::Existing(existing.clone()));
            }
            return Err(RegistryError::Conflict {
                domain: domain.to_string(),
                bucket: bucket.to_string(),
                existing: existing.kind.to_string(),
            });
        }

        let record = BucketRecord {
            domain: domain.to_string(),
            name: bucket.to_string(),
            kind,
            created_at: Utc::now(),
        };
        let key = keys::key_path(&[BUCKET_ROOT, domain, bucket]);
        self.store.put(&key, &encode(&key, &record)?)?;
        cache.buckets.insert(cache_key, record.clone());
        Ok(Created::New(record))
    }

    pub fn domain(&self, name: &str) -> RegistryResult<DomainRecord> {
        let cache = self.cache.read().map_err(|_| Self::poisoned())?;
        cache
            .domains
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::DomainNotFound(name.to_string()))
    }

    /// Look up a bucket, distinguishing a missing domain from a missing
    /// bucket.
    pub fn resolve(&self, domain: &str, bucket: &str) -> RegistryResult<BucketRecord> {
        let cache = self.cache.read().map_err(|_| Self::poisoned())?;
        if !cache.domains.contains_key(domain) {
            return Err(RegistryError::DomainNotFound(domain.to_string()));
        }
        cache
            .buckets
            .get(&(domain.to_string(), bucket.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::BucketNotFound {
                domain: domain.to_string(),
                bucket: bucket.to_string(),
            })
    }

    /// Buckets of a domain, sorted by name.
    pub fn list_buckets(&self, domain: &str) -> RegistryResult<Vec<BucketRecord>> {
        let cache = self.cache.read().map_err(|_| Self::poisoned())?;
        if !cache.domains.contains_key(domain) {
            return Err(RegistryError::DomainNotFound(domain.to_string()));
        }
        let mut buckets: Vec<BucketRecord> = cache
            .buckets
            .values()
            .filter(|b| b.domain == domain)
            .cloned()
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    pub fn domain_count(&self) -> usize {
        self.cache.read().map(|c| c.domains.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    const DOMAIN: &str = "en.wikipedia.test.local";

    fn registry() -> BucketRegistry {
        BucketRegistry::open(Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_parse_bucket_spec() {
        assert_eq!(
            parse_bucket_spec(br#"{"type":"pagecontent"}"#).unwrap(),
            BucketKind::PageContent
        );
        assert_eq!(parse_bucket_spec(br#"{"type":"kv"}"#).unwrap(), BucketKind::KeyValue);

        for bad in [
            &b""[..],
            b"not json",
            br#""pagecontent""#,
            br#"{}"#,
            br#"{"type":"wazzle"}"#,
            br#"{"type":42}"#,
        ] {
            assert!(matches!(
                parse_bucket_spec(bad),
                Err(RegistryError::InvalidSpec(_))
            ));
        }
    }

    #[test]
    fn test_create_domain_is_idempotent() {
        let registry = registry();
        assert!(registry.create_domain(DOMAIN).unwrap().is_new());
        assert!(!registry.create_domain(DOMAIN).unwrap().is_new());
        assert_eq!(registry.domain_count(), 1);
        assert!(registry.create_domain("").is_err());
    }

    #[test]
    fn test_create_bucket() {
        let registry = registry();
        registry.create_domain(DOMAIN).unwrap();

        let created = registry
            .create_bucket(DOMAIN, "pages", BucketKind::PageContent)
            .unwrap();
        assert!(created.is_new());

        // Same kind again is a no-op
        let again = registry
            .create_bucket(DOMAIN, "pages", BucketKind::PageContent)
            .unwrap();
        assert!(!again.is_new());

        let conflict = registry.create_bucket(DOMAIN, "pages", BucketKind::KeyValue);
        assert!(matches!(conflict, Err(RegistryError::Conflict { .. })));
    }

    #[test]
    fn test_bucket_requires_domain() {
        let registry = registry();
        let result = registry.create_bucket("foobar.com", "pages", BucketKind::PageContent);
        assert!(matches!(result, Err(RegistryError::DomainNotFound(_))));
    }

    #[test]
    fn test_resolve_distinguishes_missing_parts() {
        let registry = registry();
        registry.create_domain(DOMAIN).unwrap();
        registry
            .create_bucket(DOMAIN, "pages", BucketKind::PageContent)
            .unwrap();

        assert_eq!(
            registry.resolve(DOMAIN, "pages").unwrap().kind,
            BucketKind::PageContent
        );
        assert!(matches!(
            registry.resolve("foobar.com", "pages"),
            Err(RegistryError::DomainNotFound(_))
        ));
        assert!(matches!(
            registry.resolve(DOMAIN, "some_nonexisting_bucket"),
            Err(RegistryError::BucketNotFound { .. })
        ));
    }

    #[test]
    fn test_list_buckets_sorted() {
        let registry = registry();
        registry.create_domain(DOMAIN).unwrap();
        registry.create_domain("other.local").unwrap();
        registry.create_bucket(DOMAIN, "zeta", BucketKind::KeyValue).unwrap();
        registry
            .create_bucket(DOMAIN, "alpha", BucketKind::PageContent)
            .unwrap();
        registry
            .create_bucket("other.local", "hidden", BucketKind::KeyValue)
            .unwrap();

        let names: Vec<String> = registry
            .list_buckets(DOMAIN)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_registry_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = Arc::new(FileStore::open(temp_dir.path()).unwrap());
            let registry = BucketRegistry::open(store).unwrap();
            registry.create_domain(DOMAIN).unwrap();
            registry
                .create_bucket(DOMAIN, "pages", BucketKind::PageContent)
                .unwrap();
        }

        let store = Arc::new(FileStore::open(temp_dir.path()).unwrap());
        let registry = BucketRegistry::open(store).unwrap();
        assert!(registry.domain(DOMAIN).is_ok());
        assert_eq!(
            registry.resolve(DOMAIN, "pages").unwrap().kind,
            BucketKind::PageContent
        );
    }
}
