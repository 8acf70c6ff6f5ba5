use crate::events::DEFAULT_AGENT;
use crate::normalize::normalize_markup;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed palette agents are tagged with.
pub const AGENT_PALETTE: [&str; 6] = [
    "#8BAE66", "#FECACA", "#A1BC98", "#EBD5AB", "#628141", "#D2DCB6",
];

/// Stable palette slot for an agent name: the sum of its character codes
/// modulo the palette size. An empty name maps to the first slot.
pub fn palette_index(name: &str) -> usize {
    let sum = name
        .chars()
        .fold(0u64, |acc, ch| acc.wrapping_add(ch as u64));
    (sum % AGENT_PALETTE.len() as u64) as usize
}

pub fn agent_color(name: &str) -> &'static str {
    AGENT_PALETTE[palette_index(name)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Thinking,
    Done,
}

/// One attributed block of agent output in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentLogEntry {
    pub id: String,
    pub agent: String,
    pub accumulated_text: String,
    pub color: &'static str,
    pub status: EntryStatus,
    pub finalized: bool,
    pub timestamp: DateTime<Utc>,
}

impl AgentLogEntry {
    /// Starts a live entry. An empty agent name falls back to the default agent.
    pub fn new(agent: &str, text: impl Into<String>) -> Self {
        let agent = if agent.is_empty() { DEFAULT_AGENT } else { agent };
        Self {
            id: Uuid::new_v4().to_string(),
            agent: agent.to_string(),
            accumulated_text: text.into(),
            color: agent_color(agent),
            status: EntryStatus::Thinking,
            finalized: false,
            timestamp: Utc::now(),
        }
    }

    /// A closed entry, as produced from a non-streaming response.
    pub fn finalized(agent: &str, text: impl Into<String>) -> Self {
        let mut entry = Self::new(agent, text);
        entry.finalize();
        entry
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
        self.status = EntryStatus::Done;
    }

    /// True when a chunk from `agent` belongs in this entry.
    pub fn accepts_chunk_from(&self, agent: &str) -> bool {
        !self.finalized && self.agent == agent
    }

    /// The accumulated text cleaned up for display.
    pub fn display_text(&self) -> String {
        normalize_markup(&self.accumulated_text)
    }

    /// Up to two uppercase initials of the agent name, e.g. `"SA"` for
    /// `"Symptom Agent"`.
    pub fn initials(&self) -> String {
        self.agent
            .split(' ')
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum TranscriptAction {
    /// A streamed chunk attributed to an agent.
    Append { agent: String, chunk: String },
    /// Close the open entry of an agent, if it is the tail.
    Finalize { agent: String },
    /// Entries adopted wholesale, appended after the existing ones.
    Adopt(Vec<AgentLogEntry>),
}

/// Ordered, append-only sequence of agent entries in receipt order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<AgentLogEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[AgentLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reduce(mut self, action: TranscriptAction) -> Self {
        self.apply(action);
        self
    }

    /// In-place form of [`Transcript::reduce`].
    ///
    /// A chunk extends the tail entry only while that entry is open and from
    /// the same agent; anything else starts a new entry.
    pub fn apply(&mut self, action: TranscriptAction) {
        match action {
            TranscriptAction::Append { agent, chunk } => {
                let agent = if agent.is_empty() {
                    DEFAULT_AGENT.to_string()
                } else {
                    agent
                };
                match self.entries.last_mut() {
                    Some(tail) if tail.accepts_chunk_from(&agent) => {
                        tail.accumulated_text.push_str(&chunk);
                    }
                    _ => self.entries.push(AgentLogEntry::new(&agent, chunk)),
                }
            }
            TranscriptAction::Finalize { agent } => {
                if let Some(tail) = self.entries.last_mut() {
                    if tail.accepts_chunk_from(&agent) {
                        tail.finalize();
                    }
                }
            }
            TranscriptAction::Adopt(entries) => self.entries.extend(entries),
        }
    }
}
