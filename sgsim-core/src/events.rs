//! Command lifecycle events as JSONL.
//!
//! The scheduler reports every submission, rejection, withdrawal and
//! execution outcome to an [`EventSink`]. One JSON object per line:
//!
//! ```json
//! {"type":"executed","turn":3,"command_id":7,"actor":10,"action":"train","logs":["..."]}
//! ```
//!
//! `dropped` (full conditions no longer hold when the command came due) is
//! distinct from `failed` (the action ran and failed) and from a successful
//! no-op such as `rest`.
//!
//! Sink errors are logged by the caller and never affect the simulation.

use crate::command::{CommandId, CommandScope};
use crate::state::GeneralId;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandEvent {
    Submitted {
        turn: u64,
        command_id: CommandId,
        actor: GeneralId,
        action: String,
        arg: serde_json::Value,
    },

    /// Refused at submission: bad argument or unmet min condition.
    Rejected {
        turn: u64,
        actor: GeneralId,
        action: String,
        kind: String,
        reason: String,
    },

    Withdrawn {
        turn: u64,
        command_id: CommandId,
        actor: GeneralId,
        action: String,
    },

    Executed {
        turn: u64,
        command_id: CommandId,
        actor: GeneralId,
        action: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        logs: Vec<String>,
    },

    /// Ran but failed. Nothing was persisted.
    Failed {
        turn: u64,
        command_id: CommandId,
        actor: GeneralId,
        action: String,
        kind: String,
        reason: String,
    },

    /// Full conditions failed when due; never ran.
    Dropped {
        turn: u64,
        command_id: CommandId,
        actor: GeneralId,
        action: String,
        reason: String,
    },

    /// Cooldown of a resolved action elapsed.
    Expired {
        turn: u64,
        scope: CommandScope,
        holder: u64,
        family: String,
    },
}

impl CommandEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CommandEvent::Submitted { .. } => "submitted",
            CommandEvent::Rejected { .. } => "rejected",
            CommandEvent::Withdrawn { .. } => "withdrawn",
            CommandEvent::Executed { .. } => "executed",
            CommandEvent::Failed { .. } => "failed",
            CommandEvent::Dropped { .. } => "dropped",
            CommandEvent::Expired { .. } => "expired",
        }
    }
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("event sink lock poisoned")]
    Poisoned,
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: &CommandEvent) -> Result<(), EventError>;

    fn flush(&self) -> Result<(), EventError> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: &CommandEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Writes one JSON line per event to any `Write` destination.
pub struct JsonlEventSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlEventSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl EventSink for JsonlEventSink {
    fn record(&self, event: &CommandEvent) -> Result<(), EventError> {
        let mut writer = self.writer.lock().map_err(|_| EventError::Poisoned)?;
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), EventError> {
        let mut writer = self.writer.lock().map_err(|_| EventError::Poisoned)?;
        writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<CommandEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CommandEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event names in order, for compact assertions.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CommandEvent::name).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &CommandEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::Poisoned)?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct OutputCapture(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for OutputCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().flush()
        }
    }

    #[test]
    fn test_jsonl_output() {
        let output = Arc::new(Mutex::new(Cursor::new(Vec::new())));
        let sink = JsonlEventSink::new(Box::new(OutputCapture(output.clone())));

        sink.record(&CommandEvent::Dropped {
            turn: 4,
            command_id: 2,
            actor: 10,
            action: "fortify".into(),
            reason: "The treasury lacks gold.".into(),
        })
        .unwrap();
        sink.record(&CommandEvent::Executed {
            turn: 4,
            command_id: 3,
            actor: 11,
            action: "rest".into(),
            logs: vec![],
        })
        .unwrap();
        sink.flush().unwrap();

        let bytes = output.lock().unwrap().get_ref().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"dropped\""));
        assert!(lines[0].contains("\"reason\":\"The treasury lacks gold.\""));
        // Empty logs are omitted
        assert!(!lines[1].contains("logs"));

        let parsed: CommandEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.name(), "executed");
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemoryEventSink::new();
        let handle = sink.clone();
        sink.record(&CommandEvent::Withdrawn {
            turn: 0,
            command_id: 1,
            actor: 10,
            action: "train".into(),
        })
        .unwrap();
        assert_eq!(handle.names(), vec!["withdrawn"]);
    }
}
