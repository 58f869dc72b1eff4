use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::severity::SignalInputs;

/// Parent hash of the first entry in a fresh chain.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug)]
pub enum LedgerError {
    Sqlite(rusqlite::Error),
    Serialize(String),
    ChainBroken { seq: u64, detail: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "ledger sqlite error: {}", err),
            Self::Serialize(msg) => write!(f, "ledger serialize error: {}", msg),
            Self::ChainBroken { seq, detail } => {
                write!(f, "decision chain broken at seq {}: {}", seq, detail)
            }
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// What a decision did. Aborted and deferred decisions are chained exactly
/// like applied ones; a validation failure is never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    Applied,
    Aborted { reason: String },
    Deferred { reason: String },
    Decayed,
    Operator { command: String },
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::Aborted { reason } => write!(f, "aborted: {}", reason),
            Self::Deferred { reason } => write!(f, "deferred: {}", reason),
            Self::Decayed => f.write_str("decayed"),
            Self::Operator { command } => write!(f, "operator: {}", command),
        }
    }
}

/// Decision content as submitted by the engine, before chaining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDecision {
    pub pid: u32,
    pub state_from: u8,
    pub state_to: u8,
    pub severity: f64,
    pub inputs: Option<SignalInputs>,
    pub outcome: DecisionOutcome,
    pub node_id: String,
    pub ts_unix_ns: u64,
}

/// One chained ledger entry. `hash` commits over the canonical JSON of every
/// other field, including `parent_hash`, so any retroactive edit breaks
/// verification of all later entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub seq: u64,
    pub pid: u32,
    pub state_from: u8,
    pub state_to: u8,
    pub severity: f64,
    pub inputs: Option<SignalInputs>,
    pub outcome: DecisionOutcome,
    pub node_id: String,
    pub ts_unix_ns: u64,
    pub parent_hash: String,
    pub hash: String,
}

/// The hashed view: a record with its own hash field stripped. Field order
/// here is the canonical serialization order.
#[derive(Serialize)]
struct HashableRecord<'a> {
    seq: u64,
    pid: u32,
    state_from: u8,
    state_to: u8,
    severity: f64,
    inputs: &'a Option<SignalInputs>,
    outcome: &'a DecisionOutcome,
    node_id: &'a str,
    ts_unix_ns: u64,
    parent_hash: &'a str,
}

fn compute_hash(record: &DecisionRecord) -> LedgerResult<String> {
    let view = HashableRecord {
        seq: record.seq,
        pid: record.pid,
        state_from: record.state_from,
        state_to: record.state_to,
        severity: record.severity,
        inputs: &record.inputs,
        outcome: &record.outcome,
        node_id: &record.node_id,
        ts_unix_ns: record.ts_unix_ns,
        parent_hash: &record.parent_hash,
    };
    let canonical =
        serde_json::to_vec(&view).map_err(|err| LedgerError::Serialize(err.to_string()))?;
    let digest = Sha256::digest(&canonical);
    Ok(hex::encode(digest))
}

fn chain(decision: NewDecision, seq: u64, parent_hash: String) -> LedgerResult<DecisionRecord> {
    let mut record = DecisionRecord {
        seq,
        pid: decision.pid,
        state_from: decision.state_from,
        state_to: decision.state_to,
        severity: decision.severity,
        inputs: decision.inputs,
        outcome: decision.outcome,
        node_id: decision.node_id,
        ts_unix_ns: decision.ts_unix_ns,
        parent_hash,
        hash: String::new(),
    };
    record.hash = compute_hash(&record)?;
    Ok(record)
}

/// Append-only, hash-chained decision log. Injected into the escalation
/// engine so tests can swap the persistent store for the in-memory one.
pub trait DecisionLedger: Send + Sync {
    fn append(&self, decision: NewDecision) -> LedgerResult<DecisionRecord>;

    /// Verify every retained entry's hash and linkage. The parent of the
    /// earliest retained entry is trusted (retention pruning may have
    /// removed its ancestors). Returns the number of verified entries.
    fn verify_chain(&self) -> LedgerResult<usize>;

    fn entries(&self) -> LedgerResult<Vec<DecisionRecord>>;

    fn len(&self) -> LedgerResult<usize>;

    fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn verify_records(records: &[DecisionRecord]) -> LedgerResult<usize> {
    let mut prev_hash: Option<&str> = None;
    for record in records {
        let expected = compute_hash(record)?;
        if expected != record.hash {
            return Err(LedgerError::ChainBroken {
                seq: record.seq,
                detail: "entry hash does not match content".to_string(),
            });
        }
        if let Some(prev) = prev_hash {
            if record.parent_hash != prev {
                return Err(LedgerError::ChainBroken {
                    seq: record.seq,
                    detail: "parent hash does not match previous entry".to_string(),
                });
            }
        }
        prev_hash = Some(&record.hash);
    }
    Ok(records.len())
}

/// In-memory ledger for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecisionLedger for MemoryLedger {
    fn append(&self, decision: NewDecision) -> LedgerResult<DecisionRecord> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let (seq, parent) = match records.last() {
            Some(last) => (last.seq + 1, last.hash.clone()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let record = chain(decision, seq, parent)?;
        records.push(record.clone());
        Ok(record)
    }

    fn verify_chain(&self) -> LedgerResult<usize> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        verify_records(&records)
    }

    fn entries(&self) -> LedgerResult<Vec<DecisionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn len(&self) -> LedgerResult<usize> {
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

/// Durable ledger backed by sqlite (WAL). One writer at a time; readers are
/// the offline verification consumer and the operator channel.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS decisions (
                seq INTEGER PRIMARY KEY,
                pid INTEGER NOT NULL,
                state_from INTEGER NOT NULL,
                state_to INTEGER NOT NULL,
                severity REAL NOT NULL,
                inputs_json TEXT,
                outcome_json TEXT NOT NULL,
                node_id TEXT NOT NULL,
                ts_unix_ns INTEGER NOT NULL,
                parent_hash TEXT NOT NULL,
                hash TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete entries older than the retention window. Called once at
    /// startup. Chain verification afterwards starts from the earliest
    /// retained entry.
    pub fn prune_older_than(&self, retention_days: u32, now_unix_ns: u64) -> LedgerResult<usize> {
        let horizon_ns = u64::from(retention_days) * 24 * 3600 * 1_000_000_000;
        let cutoff = now_unix_ns.saturating_sub(horizon_ns);
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let deleted = conn.execute(
            "DELETE FROM decisions WHERE ts_unix_ns < ?1",
            params![cutoff as i64],
        )?;
        if deleted > 0 {
            info!(deleted, retention_days, "pruned decision ledger");
        }
        Ok(deleted)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DecisionRecord> {
        let inputs_json: Option<String> = row.get(5)?;
        let outcome_json: String = row.get(6)?;
        let inputs = match inputs_json {
            Some(raw) => serde_json::from_str(&raw).ok(),
            None => None,
        };
        let outcome = serde_json::from_str(&outcome_json).unwrap_or(DecisionOutcome::Aborted {
            reason: "unreadable outcome".to_string(),
        });
        Ok(DecisionRecord {
            seq: row.get::<_, i64>(0)? as u64,
            pid: row.get::<_, i64>(1)? as u32,
            state_from: row.get::<_, i64>(2)? as u8,
            state_to: row.get::<_, i64>(3)? as u8,
            severity: row.get(4)?,
            inputs,
            outcome,
            node_id: row.get(7)?,
            ts_unix_ns: row.get::<_, i64>(8)? as u64,
            parent_hash: row.get(9)?,
            hash: row.get(10)?,
        })
    }
}

impl DecisionLedger for SqliteLedger {
    fn append(&self, decision: NewDecision) -> LedgerResult<DecisionRecord> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tail: Option<(i64, String)> = conn
            .query_row(
                "SELECT seq, hash FROM decisions ORDER BY seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (seq, parent) = match tail {
            Some((seq, hash)) => (seq as u64 + 1, hash),
            None => (1, GENESIS_HASH.to_string()),
        };
        let record = chain(decision, seq, parent)?;

        let inputs_json = match &record.inputs {
            Some(inputs) => Some(
                serde_json::to_string(inputs)
                    .map_err(|err| LedgerError::Serialize(err.to_string()))?,
            ),
            None => None,
        };
        let outcome_json = serde_json::to_string(&record.outcome)
            .map_err(|err| LedgerError::Serialize(err.to_string()))?;

        conn.execute(
            "INSERT INTO decisions
                 (seq, pid, state_from, state_to, severity, inputs_json,
                  outcome_json, node_id, ts_unix_ns, parent_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.seq as i64,
                i64::from(record.pid),
                i64::from(record.state_from),
                i64::from(record.state_to),
                record.severity,
                inputs_json,
                outcome_json,
                record.node_id,
                record.ts_unix_ns as i64,
                record.parent_hash,
                record.hash,
            ],
        )?;
        Ok(record)
    }

    fn verify_chain(&self) -> LedgerResult<usize> {
        let records = self.entries()?;
        let verified = verify_records(&records)?;
        if verified > 0 {
            info!(verified, "decision chain verified");
        }
        Ok(verified)
    }

    fn entries(&self) -> LedgerResult<Vec<DecisionRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT seq, pid, state_from, state_to, severity, inputs_json,
                    outcome_json, node_id, ts_unix_ns, parent_hash, hash
             FROM decisions ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(record) => out.push(record),
                Err(err) => warn!(error = %err, "skipping unreadable ledger row"),
            }
        }
        Ok(out)
    }

    fn len(&self) -> LedgerResult<usize> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
