//! Event log text format
//!
//! ```text
//! [
//! {"action":...},
//! {"action":...}
//! ]
//! ```
//!
//! One event per line inside a JSON array. The file is valid JSON, and new
//! events can be appended by replacing the final `"\n]"` with
//! `",\n<event>\n]"`. An empty log is `[]`.

use crate::{event::LedgerEvent, Error, Result};

/// Closing bytes of a non-empty log
pub const TAIL: &str = "\n]";

/// Empty log
pub const EMPTY: &str = "[]";

/// One event as a single JSON line
pub fn serialize_event(event: &LedgerEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Serialize a whole log
pub fn serialize(events: &[LedgerEvent]) -> Result<String> {
    if events.is_empty() {
        return Ok(EMPTY.to_string());
    }
    let lines = events
        .iter()
        .map(serialize_event)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("[\n{}{TAIL}", lines.join(",\n")))
}

/// Bytes that replace [`TAIL`] when appending `events` to a non-empty log
pub fn append_suffix(events: &[LedgerEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(",\n");
        out.push_str(&serialize_event(event)?);
    }
    out.push_str(TAIL);
    Ok(out)
}

/// Parse a log. Any JSON array of version-1 events is accepted.
pub fn parse(text: &str) -> Result<Vec<LedgerEvent>> {
    serde_json::from_str(text).map_err(|e| Error::Parse(format!("invalid event log: {e}")))
}
