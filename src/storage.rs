// IDE Agent Gateway - LMDB Storage
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Persists gateway state to LMDB at the configured storage path.
// Used for: session registry (session:{id}), tool error journal (error:{ts}:{n}).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use heed::types::*;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const SESSION_PREFIX: &str = "session:";
const ERROR_PREFIX: &str = "error:";
const MAX_DB_SIZE: usize = 50 * 1024 * 1024; // 50MB

/// Registered session whose codebase lives outside the artifacts layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub codebase: PathBuf,
    pub registered: DateTime<Utc>,
}

/// One failed tool execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub tool_name: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

/// LMDB storage for gateway state
pub struct GatewayStorage {
    env: Env,
    /// Main key-value store: string keys → JSON values
    db: Database<Str, Str>,
    seq: AtomicU64,
}

impl GatewayStorage {
    /// Open or create LMDB at the given path
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).with_context(|| format!("creating storage dir {:?}", path))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAX_DB_SIZE)
                .max_dbs(4)
                .open(path)
                .with_context(|| format!("opening LMDB at {:?}", path))?
        };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some("gateway_state"))?;
        wtxn.commit()?;

        log::info!("Gateway LMDB opened at {:?}", path);
        Ok(Self { env, db, seq: AtomicU64::new(0) })
    }

    /// Store arbitrary key-value pair
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Retrieve a value by key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.get(&rtxn, key)?.map(|s| s.to_string()))
    }

    /// Delete a key
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.db.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(deleted)
    }

    fn values_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for item in self.db.prefix_iter(&rtxn, prefix)? {
            let (_, value) = item?;
            out.push(value.to_string());
        }
        Ok(out)
    }

    // ========================================================================
    // SESSION REGISTRY
    // ========================================================================

    pub fn register_session(&self, id: &str, codebase: &Path) -> Result<SessionRecord> {
        let record = SessionRecord {
            id: id.to_string(),
            codebase: codebase.to_path_buf(),
            registered: Utc::now(),
        };
        self.put(&format!("{}{}", SESSION_PREFIX, id), &serde_json::to_string(&record)?)?;
        log::info!("Registered session {} at {:?}", id, codebase);
        Ok(record)
    }

    pub fn lookup_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        match self.get(&format!("{}{}", SESSION_PREFIX, id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json).context("corrupt session record")?)),
            None => Ok(None),
        }
    }

    /// Remove a registration. Returns false when the id was not registered.
    pub fn unregister_session(&self, id: &str) -> Result<bool> {
        self.delete(&format!("{}{}", SESSION_PREFIX, id))
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.values_with_prefix(SESSION_PREFIX)?
            .iter()
            .map(|json| serde_json::from_str(json).context("corrupt session record"))
            .collect()
    }

    // ========================================================================
    // ERROR JOURNAL
    // ========================================================================

    pub fn record_error(&self, tool_name: &str, error_message: &str) -> Result<()> {
        let record = ErrorRecord {
            tool_name: tool_name.to_string(),
            error_message: error_message.to_string(),
            timestamp: Utc::now(),
        };
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{}{}:{:06}", ERROR_PREFIX, record.timestamp.format("%Y%m%dT%H%M%S%.6f"), n);
        self.put(&key, &serde_json::to_string(&record)?)
    }

    /// Journal entries, oldest first
    pub fn errors(&self) -> Result<Vec<ErrorRecord>> {
        self.values_with_prefix(ERROR_PREFIX)?
            .iter()
            .map(|json| serde_json::from_str(json).context("corrupt error record"))
            .collect()
    }

    /// Get entry count
    pub fn entry_count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        let stat = self.db.stat(&rtxn)?;
        Ok(stat.entries as u64)
    }
}

// ============================================================================
// TESTS
// ============================================================================
