use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;

/// State of one tracked invocation. Successful invocations are removed from
/// the ledger, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStatus {
    Retrying,
    Failed,
}

/// One in-flight or terminally failed retry invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RetryOperation {
    /// Caller-supplied logical name (e.g. `relay-message:room-1`).
    pub operation_id: String,
    pub attempts: u32,
    pub status: RetryStatus,
    pub last_error: String,
    /// Unix millis of the next attempt; only set while retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<i64>,
    /// Opaque caller payload for diagnostics.
    pub context: serde_json::Value,
}

/// How ledger keys are derived from operation ids.
///
/// `PerInvocation` tracks every call independently, so two retries of the
/// same logical operation started at different times never merge.
/// `ByOperationId` keeps a single entry per operation id, which gives
/// operator-facing dedup at the cost of one invocation overwriting another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LedgerKeying {
    #[default]
    PerInvocation,
    ByOperationId,
}

/// Snapshot of the ledger for the administrative surface.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub retrying: usize,
    pub failed: usize,
    pub operations: Vec<RetryOperation>,
}

/// In-memory status ledger. Volatile by design: retry state does not survive
/// a process restart.
pub struct RetryLedger {
    keying: LedgerKeying,
    seq: AtomicU64,
    // Sync lock, never held across an .await point.
    entries: RwLock<HashMap<String, RetryOperation>>,
}

impl RetryLedger {
    pub fn new(keying: LedgerKeying) -> Self {
        Self {
            keying,
            seq: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Ledger key for a fresh invocation of `operation_id`.
    pub fn key_for(&self, operation_id: &str) -> String {
        match self.keying {
            LedgerKeying::PerInvocation => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                format!("{operation_id}#{seq}")
            },
            LedgerKeying::ByOperationId => operation_id.to_string(),
        }
    }

    pub fn record(&self, key: &str, operation: RetryOperation) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), operation);
    }

    /// Drop the entry for a successful invocation.
    pub fn discard(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    pub fn status(&self) -> LedgerStatus {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let operations: Vec<RetryOperation> = entries.values().cloned().collect();
        LedgerStatus {
            retrying: operations
                .iter()
                .filter(|op| op.status == RetryStatus::Retrying)
                .count(),
            failed: operations
                .iter()
                .filter(|op| op.status == RetryStatus::Failed)
                .count(),
            operations,
        }
    }

    pub fn failed_operations(&self) -> Vec<RetryOperation> {
        self.by_status(RetryStatus::Failed)
    }

    pub fn retrying_operations(&self) -> Vec<RetryOperation> {
        self.by_status(RetryStatus::Retrying)
    }

    /// Remove all terminal `Failed` records; returns how many were cleared.
    /// In-flight `Retrying` entries are untouched.
    pub fn clear_failed(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, op| op.status != RetryStatus::Failed);
        before - entries.len()
    }

    fn by_status(&self, status: RetryStatus) -> Vec<RetryOperation> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|op| op.status == status)
            .cloned()
            .collect()
    }
}
