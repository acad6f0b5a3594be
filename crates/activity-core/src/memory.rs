//! An in-memory [`Store`] implementation: no database, no transactions.
//!
//! Used by `activity-core`'s own tests (spec §8 scenarios) and by the
//! `activity-ingest` binary's `--dry-run` mode, where §6 says messages
//! should be "parsed and scored but not persisted": this store gives
//! dry-run a real `Store` to talk to without touching a database.

use crate::error::StoreError;
use crate::model::{ActivityRow, InternalId, UserLevels};
use crate::rolling::GuildStats;
use crate::scorer::PrevUser;
use crate::store::{ActivitySink, GuildTxn, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    next_id: InternalId,
    guild_ids: HashMap<String, InternalId>,
    user_ids: HashMap<String, InternalId>,
    user_levels: HashMap<(InternalId, InternalId), UserLevels>,
    rows: Vec<ActivityRow>,
}

/// An in-process `Store` backed by a mutex-guarded table set. Single-threaded
/// use only (spec §5: one ingest job per guild per `Store`), the mutex just
/// makes it safely `Send + Sync` for the trait bound.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row written so far, in insertion order. Intended
    /// for tests and dry-run reporting.
    pub fn rows(&self) -> Vec<ActivityRow> {
        self.tables.lock().unwrap().rows.clone()
    }

    pub fn user_levels(&self, user_id: InternalId, guild_id: InternalId) -> UserLevels {
        self.tables
            .lock()
            .unwrap()
            .user_levels
            .get(&(user_id, guild_id))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin_guild(&self) -> Result<Box<dyn GuildTxn + '_>, StoreError> {
        Ok(Box::new(MemoryTxn { store: self }))
    }
}

struct MemoryTxn<'a> {
    store: &'a InMemoryStore,
}

struct MemorySink<'a> {
    store: &'a InMemoryStore,
    pending: Vec<ActivityRow>,
}

#[async_trait]
impl<'a> ActivitySink for MemorySink<'a> {
    async fn write_row(&mut self, row: &ActivityRow) -> Result<(), StoreError> {
        self.pending.push(row.clone());
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        self.store.tables.lock().unwrap().rows.extend(self.pending);
        Ok(())
    }
}

#[async_trait]
impl<'a> GuildTxn for MemoryTxn<'a> {
    async fn ensure_guild(
        &mut self,
        guild_id_ext: &str,
        _guild_name: &str,
    ) -> Result<InternalId, StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        if let Some(&id) = tables.guild_ids.get(guild_id_ext) {
            return Ok(id);
        }
        tables.next_id += 1;
        let id = tables.next_id;
        tables.guild_ids.insert(guild_id_ext.to_string(), id);
        Ok(id)
    }

    async fn ensure_user(
        &mut self,
        user_id_ext: &str,
        _username: &str,
    ) -> Result<InternalId, StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        if let Some(&id) = tables.user_ids.get(user_id_ext) {
            return Ok(id);
        }
        tables.next_id += 1;
        let id = tables.next_id;
        tables.user_ids.insert(user_id_ext.to_string(), id);
        Ok(id)
    }

    async fn cached_user_levels(
        &mut self,
        user_id: InternalId,
        guild_id: InternalId,
    ) -> Result<UserLevels, StoreError> {
        Ok(self.store.user_levels(user_id, guild_id))
    }

    async fn seed_guild_stats(
        &mut self,
        _guild_id: InternalId,
        _first_ts: DateTime<Utc>,
    ) -> Result<Option<GuildStats>, StoreError> {
        Ok(None)
    }

    async fn seed_prev_users(
        &mut self,
        _guild_id: InternalId,
        _first_ts: DateTime<Utc>,
    ) -> Result<HashMap<InternalId, PrevUser>, StoreError> {
        Ok(HashMap::new())
    }

    async fn seed_recent_simhashes(
        &mut self,
        _guild_id: InternalId,
        _window_start: DateTime<Utc>,
        _first_ts: DateTime<Utc>,
        _cap_per_user: usize,
    ) -> Result<HashMap<InternalId, Vec<(u64, i32, DateTime<Utc>)>>, StoreError> {
        Ok(HashMap::new())
    }

    async fn open_activity_sink(&mut self) -> Result<Box<dyn ActivitySink>, StoreError> {
        Ok(Box::new(MemorySink {
            store: self.store,
            pending: Vec::new(),
        }))
    }

    async fn flush_user_levels(
        &mut self,
        guild_id: InternalId,
        updates: Vec<(InternalId, UserLevels)>,
    ) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        for (user_id, levels) in updates {
            tables.user_levels.insert((user_id, guild_id), levels);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
