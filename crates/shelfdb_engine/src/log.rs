//! The append-only log: entry types, framing and recovery.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "SHLF" (4) | length (4, LE) | CBOR payload (N) | crc32 (4, LE) |
//! ```
//!
//! The checksum covers magic, length and payload.
//!
//! ## Recovery Policy
//!
//! - A frame cut short at the end of the log is a crash mid-append. The tail
//!   is truncated and recovery keeps every complete frame before it.
//! - A short frame followed by an intact frame means its length field is
//!   damaged. That is corruption, and the log is left as it is.
//! - A bad magic, a checksum mismatch or an undecodable payload is
//!   corruption and fails the open.

use crate::error::{EngineError, EngineResult};
use crate::schema::{IndexParams, StoreParams};
use crate::store::{Mutation, StoreState};
use serde::{Deserialize, Serialize};
use shelfdb_storage::LogBackend;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const MAGIC: [u8; 4] = *b"SHLF";
const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 4;

/// Declared shape of one store, as written by an upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreSchema {
    pub(crate) name: String,
    pub(crate) params: StoreParams,
    pub(crate) indexes: Vec<(String, IndexParams)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum LogEntry {
    /// Full schema after an upgrade.
    Schema {
        version: u32,
        stores: Vec<StoreSchema>,
    },
    /// Writes of one committed transaction.
    Commit {
        store: String,
        next_key: u64,
        mutations: Vec<Mutation>,
    },
}

impl LogEntry {
    pub(crate) fn schema(version: u32, stores: &BTreeMap<String, std::sync::Arc<StoreState>>) -> Self {
        let stores = stores
            .iter()
            .map(|(name, state)| StoreSchema {
                name: name.clone(),
                params: state.params.clone(),
                indexes: state
                    .indexes
                    .iter()
                    .map(|(index, state)| (index.clone(), state.params.clone()))
                    .collect(),
            })
            .collect();
        Self::Schema { version, stores }
    }
}

pub(crate) fn encode_frame(entry: &LogEntry) -> EngineResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(entry, &mut payload).map_err(|e| EngineError::codec(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| EngineError::codec(format!("entry of {} bytes is too large", payload.len())))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Splits a log into entries.
///
/// Returns the entries and the length of the valid prefix.
pub(crate) fn decode_frames(bytes: &[u8]) -> EngineResult<(Vec<LogEntry>, usize)> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < HEADER_LEN {
            break;
        }
        if rest[..4] != MAGIC {
            return Err(EngineError::corrupted(offset as u64, "bad frame magic"));
        }
        let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let total = HEADER_LEN.saturating_add(len).saturating_add(TRAILER_LEN);
        if rest.len() < total {
            // A short frame is only a torn tail if nothing intact follows it.
            if let Some(at) = next_intact_frame(&rest[1..]) {
                return Err(EngineError::corrupted(
                    offset as u64,
                    format!(
                        "frame length {len} overruns an intact frame at offset {}",
                        offset + 1 + at
                    ),
                ));
            }
            break;
        }

        let body_end = HEADER_LEN + len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        let actual = crc32fast::hash(&rest[..body_end]);
        if stored != actual {
            return Err(EngineError::corrupted(
                offset as u64,
                format!("checksum mismatch: expected {stored:08x}, got {actual:08x}"),
            ));
        }

        let entry: LogEntry = ciborium::from_reader(&rest[HEADER_LEN..body_end])
            .map_err(|e| EngineError::corrupted(offset as u64, e.to_string()))?;
        entries.push(entry);
        offset += total;
    }

    Ok((entries, offset))
}

/// Position of the first complete, checksummed frame in `bytes`.
fn next_intact_frame(bytes: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = bytes[from..].windows(MAGIC.len()).position(|w| w == MAGIC) {
        let at = from + found;
        let rest = &bytes[at..];
        if rest.len() >= HEADER_LEN {
            let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
            let body_end = HEADER_LEN.saturating_add(len);
            if rest.len() >= body_end.saturating_add(TRAILER_LEN) {
                let stored = u32::from_le_bytes([
                    rest[body_end],
                    rest[body_end + 1],
                    rest[body_end + 2],
                    rest[body_end + 3],
                ]);
                if stored == crc32fast::hash(&rest[..body_end]) {
                    return Some(at);
                }
            }
        }
        from = at + 1;
    }
    None
}

/// State rebuilt from the log.
#[derive(Debug, Default)]
pub(crate) struct Recovered {
    pub(crate) version: u32,
    pub(crate) stores: BTreeMap<String, StoreState>,
}

/// Reads the whole log, drops a torn tail and replays every entry.
pub(crate) fn recover(log: &mut dyn LogBackend) -> EngineResult<Recovered> {
    let bytes = log.read_all()?;
    let (entries, valid) = decode_frames(&bytes)?;
    if valid < bytes.len() {
        warn!(
            valid,
            size = bytes.len(),
            "truncating torn frame at end of log"
        );
        log.truncate(valid as u64)?;
    }

    let mut recovered = Recovered::default();
    let count = entries.len();
    for entry in entries {
        replay(&mut recovered, entry)?;
    }
    debug!(
        entries = count,
        version = recovered.version,
        stores = recovered.stores.len(),
        "log replayed"
    );
    Ok(recovered)
}

fn replay(recovered: &mut Recovered, entry: LogEntry) -> EngineResult<()> {
    match entry {
        LogEntry::Schema { version, stores } => {
            recovered.version = version;
            for schema in stores {
                let state = recovered
                    .stores
                    .entry(schema.name.clone())
                    .or_insert_with(|| StoreState::new(schema.params.clone()));
                for (index, params) in schema.indexes {
                    if !state.indexes.contains_key(&index) {
                        state.create_index(&schema.name, &index, params)?;
                    }
                }
            }
        }
        LogEntry::Commit {
            store,
            next_key,
            mutations,
        } => {
            let state = recovered
                .stores
                .get_mut(&store)
                .ok_or_else(|| EngineError::corrupted(0, format!("commit for unknown store {store}")))?;
            for mutation in mutations {
                state.apply(mutation)?;
            }
            state.next_key = next_key;
        }
    }
    Ok(())
}
