use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use election_core::projector::{BatchReport, Projection};
use election_core::state::LedgerEvent;
use serde::Deserialize;

use crate::utils::{decompress_gzip_with_limit, max_events_bytes, read_all_with_limit};

/// An exported ledger event log: a JSON array of events, or an object with
/// an `events` array (the body accepted by `POST /events`).
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    pub events: Vec<LedgerEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventLogFile {
    Bare(Vec<LedgerEvent>),
    Wrapped { events: Vec<LedgerEvent> },
}

impl EventLog {
    /// Reads a log from disk. `is_compressed` defaults to a `.gz` extension check.
    pub fn read(path: &Path, is_compressed: Option<bool>) -> io::Result<Self> {
        let is_compressed =
            is_compressed.unwrap_or_else(|| path.extension().is_some_and(|ext| ext == "gz"));
        let file = File::open(path)?;
        let limit = max_events_bytes();
        let buf = if is_compressed {
            decompress_gzip_with_limit(file, limit)?
        } else {
            read_all_with_limit(file, limit)?
        };
        Self::from_slice(&buf)
    }

    pub fn from_reader<R: Read>(reader: R) -> io::Result<Self> {
        Self::from_slice(&read_all_with_limit(reader, max_events_bytes())?)
    }

    pub fn from_slice(buf: &[u8]) -> io::Result<Self> {
        let file: EventLogFile = serde_json::from_slice(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let events = match file {
            EventLogFile::Bare(events) | EventLogFile::Wrapped { events } => events,
        };
        Ok(Self { events })
    }

    /// Replays the whole log into a fresh projection.
    pub fn replay(&self) -> (Projection, BatchReport) {
        let mut projection = Projection::new();
        let report = projection.apply_backlog(self.events.clone());
        (projection, report)
    }

    /// Splits the log into ingest batches of at most `size` events.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[LedgerEvent]> {
        self.events.chunks(size.max(1))
    }
}
