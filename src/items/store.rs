//! # Revisioned Item Store
//!
//! Immutable snapshots addressed by generation token, plus two kinds of
//! mutable pointer per item: revision → newest token, and latest.
//!
//! Write order is always snapshot first, then pointers, so a pointer never
//! names a snapshot that was not durably written. Pointer updates for one
//! item are serialized through a per-item lock; reads take no lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::errors::{ItemError, ItemResult};
use super::snapshot::{ItemKey, LatestPointer, Snapshot};
use crate::identity::{GenerationToken, Selector, TokenMinter};
use crate::storage::{keys, KeyValueStore, StorageError};

/// Outcome of [`ItemStore::get`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(Snapshot),
    /// Nothing usable is stored for this revision; the caller may render it
    Miss(u64),
}

/// One property's rendering, waiting to be stored by
/// [`ItemStore::put_rendered`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub item: ItemKey,
    pub content_type: String,
    pub body: Bytes,
}

/// Outcome of [`ItemStore::put`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub snapshot: Snapshot,
    /// False when a client-pinned token was re-sent with identical content
    pub written: bool,
}

pub struct ItemStore {
    store: Arc<dyn KeyValueStore>,
    minter: TokenMinter,
    locks: Mutex<HashMap<ItemKey, Arc<Mutex<()>>>>,
}

impl ItemStore {
    /// Open the item store over `store`.
    ///
    /// Every persisted token is fed to the minter so that tokens minted by
    /// this process sort after them even if the clock moved backwards.
    pub fn open(store: Arc<dyn KeyValueStore>) -> ItemResult<Self> {
        let minter = TokenMinter::new();
        for key in store.scan_keys(&ItemKey::root_prefix())? {
            if let Some(token) = ItemKey::token_from_snapshot_key(&key) {
                minter.observe(&token);
            }
        }

        Ok(Self {
            store,
            minter,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn poisoned() -> ItemError {
        ItemError::Storage(StorageError::lock_poisoned())
    }

    /// Run `write` while holding `item`'s lock.
    ///
    /// The lock entry is dropped again once no other writer holds or waits
    /// on it, so the map only ever contains items being written right now.
    fn with_item_lock<T>(
        &self,
        item: &ItemKey,
        write: impl FnOnce() -> ItemResult<T>,
    ) -> ItemResult<T> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| Self::poisoned())?;
            Arc::clone(locks.entry(item.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().map_err(|_| Self::poisoned())?;
            write()
        };

        // Clones are only taken under the map lock: the map's copy plus ours
        // means nobody else is queued.
        let mut locks = self.locks.lock().map_err(|_| Self::poisoned())?;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(item);
        }
        result
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn mint(&self, item: &ItemKey) -> ItemResult<GenerationToken> {
        self.minter
            .mint()
            .map_err(|e| ItemError::Conflict(format!("cannot store {}: {}", item, e)))
    }

    /// Resolve `selector` for `item`.
    ///
    /// `no_cache` turns a stored numeric revision (or a latest pointer with a
    /// numeric revision) into a miss; tokens are immutable and ignore it.
    pub fn get(&self, item: &ItemKey, selector: &Selector, no_cache: bool) -> ItemResult<Lookup> {
        match selector {
            Selector::Token(token) => self
                .snapshot(item, token)?
                .map(Lookup::Hit)
                .ok_or_else(|| ItemError::NotFound(format!("{} at {}", item, token))),

            Selector::Revision(revision) => {
                if no_cache {
                    return Ok(Lookup::Miss(*revision));
                }
                match self.revision_token(item, *revision)? {
                    Some(token) => Ok(Lookup::Hit(self.pointed_snapshot(item, &token)?)),
                    None => Ok(Lookup::Miss(*revision)),
                }
            }

            Selector::Latest => {
                let latest = self
                    .latest(item)?
                    .ok_or_else(|| ItemError::NotFound(format!("{} has no revisions", item)))?;
                match (no_cache, latest.revision) {
                    (true, Some(revision)) => Ok(Lookup::Miss(revision)),
                    _ => Ok(Lookup::Hit(self.pointed_snapshot(item, &latest.token)?)),
                }
            }
        }
    }

    /// Store a new snapshot for `item`.
    ///
    /// A revision selector gets a freshly minted token; a token selector is
    /// used verbatim and attached to the item's latest numeric revision.
    pub fn put(
        &self,
        item: &ItemKey,
        selector: &Selector,
        content_type: &str,
        body: Bytes,
    ) -> ItemResult<PutOutcome> {
        match selector {
            Selector::Revision(revision) => {
                let token = self.mint(item)?;
                let snapshot = self.put_revision(item, *revision, token, content_type, body)?;
                Ok(PutOutcome {
                    snapshot,
                    written: true,
                })
            }
            Selector::Token(token) => self.put_pinned(item, *token, content_type, body),
            Selector::Latest => Err(ItemError::InvalidRequest(format!(
                "PUT to {} needs a revision or token",
                item
            ))),
        }
    }

    /// Store the properties produced by one render of `revision`.
    ///
    /// Every part gets the same freshly minted token, so properties rendered
    /// together stay addressable as one generation.
    pub fn put_rendered(
        &self,
        revision: u64,
        parts: Vec<RenderedContent>,
    ) -> ItemResult<Vec<Snapshot>> {
        let first = match parts.first() {
            Some(part) => &part.item,
            None => return Ok(Vec::new()),
        };
        let token = self.mint(first)?;
        parts
            .into_iter()
            .map(|part| {
                self.put_revision(&part.item, revision, token, &part.content_type, part.body)
            })
            .collect()
    }

    fn put_revision(
        &self,
        item: &ItemKey,
        revision: u64,
        token: GenerationToken,
        content_type: &str,
        body: Bytes,
    ) -> ItemResult<Snapshot> {
        let snapshot = Snapshot {
            token,
            revision: Some(revision),
            content_type: content_type.to_string(),
            body,
        };

        self.with_item_lock(item, || {
            self.write_snapshot(item, &snapshot)?;
            self.write_revision_pointer(item, revision, &token)?;

            let advance = match self.latest(item)? {
                Some(LatestPointer {
                    revision: Some(current),
                    ..
                }) => revision >= current,
                _ => true,
            };
            if advance {
                self.write_latest(
                    item,
                    &LatestPointer {
                        revision: Some(revision),
                        token,
                    },
                )?;
            }
            Ok(())
        })?;
        Ok(snapshot)
    }

    fn put_pinned(
        &self,
        item: &ItemKey,
        token: GenerationToken,
        content_type: &str,
        body: Bytes,
    ) -> ItemResult<PutOutcome> {
        self.with_item_lock(item, || {
            if let Some(existing) = self.snapshot(item, &token)? {
                if existing.same_content(content_type, &body) {
                    return Ok(PutOutcome {
                        snapshot: existing,
                        written: false,
                    });
                }
                return Err(ItemError::Conflict(format!(
                    "{} already names different content for {}",
                    token, item
                )));
            }

            let revision = self.latest(item)?.and_then(|latest| latest.revision);
            let snapshot = Snapshot {
                token,
                revision,
                content_type: content_type.to_string(),
                body,
            };

            self.write_snapshot(item, &snapshot)?;
            if let Some(revision) = revision {
                self.write_revision_pointer(item, revision, &token)?;
            }
            self.write_latest(item, &LatestPointer { revision, token })?;
            self.minter.observe(&token);

            Ok(PutOutcome {
                snapshot,
                written: true,
            })
        })
    }

    /// Numeric revisions known for `item`, newest first.
    pub fn list_revisions(&self, item: &ItemKey) -> ItemResult<Vec<u64>> {
        let prefix = item.revision_prefix();
        let mut revisions: Vec<u64> = self
            .store
            .scan_keys(&prefix)?
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|padded| padded.parse().ok())
            .collect();
        revisions.reverse();
        Ok(revisions)
    }

    /// Titles with at least one stored snapshot, in key order.
    pub fn list_titles(&self, domain: &str, bucket: &str) -> ItemResult<Vec<String>> {
        let prefix = ItemKey::bucket_prefix(domain, bucket);
        let titles: BTreeSet<String> = self
            .store
            .scan_keys(&prefix)?
            .iter()
            .filter_map(|key| keys::child_segment(key, &prefix))
            .collect();
        Ok(titles.into_iter().collect())
    }

    fn snapshot(&self, item: &ItemKey, token: &GenerationToken) -> ItemResult<Option<Snapshot>> {
        let key = item.snapshot_key(token);
        match self.store.get(&key)? {
            Some(value) => Ok(Some(Snapshot::decode(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Snapshot a pointer refers to; a dangling pointer is corruption.
    fn pointed_snapshot(&self, item: &ItemKey, token: &GenerationToken) -> ItemResult<Snapshot> {
        self.snapshot(item, token)?.ok_or_else(|| {
            ItemError::Storage(StorageError::corruption_for_key(
                &item.snapshot_key(token),
                "Pointer refers to a missing snapshot",
            ))
        })
    }

    fn revision_token(&self, item: &ItemKey, revision: u64) -> ItemResult<Option<GenerationToken>> {
        let key = item.revision_key(revision);
        match self.store.get(&key)? {
            Some(value) => {
                let token = std::str::from_utf8(&value)
                    .ok()
                    .and_then(|s| GenerationToken::parse(s).ok())
                    .ok_or_else(|| {
                        StorageError::corruption_for_key(&key, "Undecodable revision pointer")
                    })?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    fn latest(&self, item: &ItemKey) -> ItemResult<Option<LatestPointer>> {
        let key = item.latest_key();
        match self.store.get(&key)? {
            Some(value) => {
                let latest = serde_json::from_slice(&value).map_err(|e| {
                    StorageError::corruption_for_key(&key, format!("Undecodable latest pointer: {}", e))
                })?;
                Ok(Some(latest))
            }
            None => Ok(None),
        }
    }

    fn write_snapshot(&self, item: &ItemKey, snapshot: &Snapshot) -> ItemResult<()> {
        let key = item.snapshot_key(&snapshot.token);
        self.store.put(&key, &snapshot.encode()?)?;
        Ok(())
    }

    fn write_revision_pointer(
        &self,
        item: &ItemKey,
        revision: u64,
        token: &GenerationToken,
    ) -> ItemResult<()> {
        self.store
            .put(&item.revision_key(revision), token.to_string().as_bytes())?;
        Ok(())
    }

    fn write_latest(&self, item: &ItemKey, latest: &LatestPointer) -> ItemResult<()> {
        let key = item.latest_key();
        let value = serde_json::to_vec(latest).map_err(|e| {
            StorageError::write_failed(format!("Failed to encode latest pointer for {}", item), e.into())
        })?;
        self.store.put(&key, &value)?;
        Ok(())
    }
}
