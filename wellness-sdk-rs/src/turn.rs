use crate::events::{AnswerPayload, StreamRecord, object_guidance, truthy_text, value_to_text};
use crate::models::{AgentFlowStep, HealthAssistResponse};
use crate::normalize::repair_fused_text;
use crate::transcript::{AgentLogEntry, Transcript, TranscriptAction};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub const STATUS_NEED_SYMPTOMS: &str = "Please enter symptoms to continue.";
pub const STATUS_PREPARING: &str = "Preparing your wellness guidance…";
pub const STATUS_STREAM_FAILED: &str = "Streaming failed, trying standard request...";
pub const STATUS_GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
pub const STATUS_THINKING: &str = "Thinking…";
pub const STATUS_FOLLOW_UP_FAILED: &str = "Failed to fetch follow-up answer.";

const SUMMARY_SEPARATOR: &str = "\n\n";

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Streaming,
    /// Waiting on the non-streaming request, after an empty or failed stream.
    Fallback,
    Completed,
    Failed,
}

/// Everything a view needs to render one submission.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationTurnState {
    pub turn_id: u64,
    pub symptoms_text: String,
    pub medical_report_text: String,
    pub transcript: Transcript,
    pub summary_text: Option<String>,
    pub recommendations: Vec<String>,
    pub status_message: String,
    pub phase: TurnPhase,
    pub generating: bool,
}

impl ConversationTurnState {
    /// Fresh state for a submission that is about to stream.
    pub fn begin(turn_id: u64, symptoms: &str, medical_report: &str) -> Self {
        Self {
            turn_id,
            symptoms_text: symptoms.to_string(),
            medical_report_text: medical_report.to_string(),
            status_message: STATUS_PREPARING.to_string(),
            phase: TurnPhase::Streaming,
            generating: true,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> &str {
        self.summary_text.as_deref().unwrap_or("")
    }

    /// True once the turn has any summary text or recommendations.
    pub fn has_result(&self) -> bool {
        !self.summary().is_empty() || !self.recommendations.is_empty()
    }

    pub fn apply_record(&mut self, record: StreamRecord) {
        debug!("Turn {} applying {:?}", self.turn_id, record);
        match record {
            StreamRecord::Thought { agent, content } => {
                self.transcript.apply(TranscriptAction::Append {
                    agent,
                    chunk: content,
                });
            }
            StreamRecord::Answer { agent, payload } => {
                match payload {
                    AnswerPayload::Text(text) => self.append_summary(&text),
                    AnswerPayload::Structured {
                        recommendations,
                        guidance,
                    } => {
                        if let Some(recommendations) = recommendations {
                            self.recommendations = recommendations;
                        }
                        if let Some(guidance) = guidance {
                            self.append_summary(&guidance);
                        }
                    }
                }
                if let Some(agent) = agent {
                    self.transcript.apply(TranscriptAction::Finalize { agent });
                }
            }
            StreamRecord::Status { status } => {
                if let Some(status) = status {
                    self.status_message = status;
                }
            }
        }
    }

    /// Repairs `text` and appends it to the summary as a new paragraph.
    pub fn append_summary(&mut self, text: &str) {
        let cleaned = repair_fused_text(text);
        if cleaned.is_empty() {
            return;
        }
        match &mut self.summary_text {
            Some(summary) if !summary.is_empty() => {
                summary.push_str(SUMMARY_SEPARATOR);
                summary.push_str(&cleaned);
            }
            _ => self.summary_text = Some(cleaned),
        }
    }

    /// Merges a `/health-assist` response into the turn.
    ///
    /// Agent flow steps land as finalized entries after the existing ones.
    pub fn adopt_fallback(&mut self, response: HealthAssistResponse) {
        if let Some(recommendations) = response.recommendations {
            self.recommendations = recommendations;
        }

        if let Some(flow) = response.agent_flow {
            let entries = flow
                .iter()
                .enumerate()
                .map(|(index, step)| flow_entry(index, step))
                .collect();
            self.transcript.apply(TranscriptAction::Adopt(entries));
        }

        let guidance = response
            .synthesized_guidance
            .as_ref()
            .and_then(guidance_text)
            .or_else(|| response.final_summary.as_ref().and_then(guidance_text));
        if let Some(guidance) = guidance {
            self.append_summary(&guidance);
        }
    }
}

fn flow_entry(index: usize, step: &AgentFlowStep) -> AgentLogEntry {
    let agent = match step.agent.as_deref() {
        Some(agent) if !agent.is_empty() => agent.to_string(),
        _ => format!("Agent {}", index + 1),
    };
    let output = match &step.output {
        Value::Null => String::new(),
        other => value_to_text(other),
    };
    AgentLogEntry::finalized(&agent, output)
}

fn guidance_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => object_guidance(fields),
        other => truthy_text(other),
    }
}

/// Progress of the single follow-up question slot.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct FollowUpState {
    pub question: String,
    pub answer: String,
    pub status_message: String,
    pub pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::EntryStatus;
    use serde_json::json;

    fn thought(agent: &str, content: &str) -> StreamRecord {
        StreamRecord::Thought {
            agent: agent.to_string(),
            content: content.to_string(),
        }
    }

    fn recommendations_answer(items: &[&str]) -> StreamRecord {
        StreamRecord::Answer {
            agent: None,
            payload: AnswerPayload::Structured {
                recommendations: Some(items.iter().map(|s| s.to_string()).collect()),
                guidance: None,
            },
        }
    }

    #[test]
    fn test_begin_resets_to_streaming() {
        let state = ConversationTurnState::begin(3, "headache", "");
        assert_eq!(state.turn_id, 3);
        assert_eq!(state.phase, TurnPhase::Streaming);
        assert!(state.generating);
        assert_eq!(state.status_message, STATUS_PREPARING);
        assert!(!state.has_result());
    }

    #[test]
    fn test_recommendations_are_replaced() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(recommendations_answer(&["Old one", "Old two"]));
        state.apply_record(recommendations_answer(&["Drink water"]));
        assert_eq!(state.recommendations, vec!["Drink water".to_string()]);
    }

    #[test]
    fn test_summary_appends_with_blank_line() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(StreamRecord::Answer {
            agent: None,
            payload: AnswerPayload::Text("symptoms.Please rest".to_string()),
        });
        state.apply_record(StreamRecord::Answer {
            agent: None,
            payload: AnswerPayload::Structured {
                recommendations: None,
                guidance: Some("Stay hydrated".to_string()),
            },
        });
        assert_eq!(state.summary(), "symptoms. Please rest\n\nStay hydrated");
        assert!(state.recommendations.is_empty());
    }

    #[test]
    fn test_empty_answer_is_noop() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(StreamRecord::Answer {
            agent: None,
            payload: AnswerPayload::Text("  ".to_string()),
        });
        assert_eq!(state.summary_text, None);
    }

    #[test]
    fn test_answer_finalizes_named_agent() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(thought("DietAgent", "Eat greens"));
        state.apply_record(StreamRecord::Answer {
            agent: Some("DietAgent".to_string()),
            payload: AnswerPayload::Text("Done".to_string()),
        });
        state.apply_record(thought("DietAgent", "More"));
        let entries = state.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, EntryStatus::Done);
        assert!(!entries[1].finalized);
    }

    #[test]
    fn test_status_record_updates_message() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(StreamRecord::Status {
            status: Some("Consulting agents".to_string()),
        });
        assert_eq!(state.status_message, "Consulting agents");
        state.apply_record(StreamRecord::Status { status: None });
        assert_eq!(state.status_message, "Consulting agents");
    }

    #[test]
    fn test_adopt_fallback_builds_finalized_entries_in_order() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.apply_record(thought("SymptomAgent", "partial"));
        let response: HealthAssistResponse = serde_json::from_value(json!({
            "recommendations": ["Sleep early"],
            "synthesized_guidance": {"text": "RestWell.Drink water"},
            "final_summary": "ignored",
            "agent_flow": [
                {"agent": "SymptomAgent", "output": "mild"},
                {"output": {"score": 2}},
                {"agent": "", "output": null}
            ]
        }))
        .unwrap();
        state.adopt_fallback(response);

        let entries = state.transcript.entries();
        let agents: Vec<&str> = entries.iter().map(|e| e.agent.as_str()).collect();
        assert_eq!(agents, vec!["SymptomAgent", "SymptomAgent", "Agent 2", "Agent 3"]);
        assert!(!entries[0].finalized);
        assert!(entries[1..].iter().all(|e| e.finalized));
        assert_eq!(entries[2].accumulated_text, r#"{"score":2}"#);
        assert_eq!(entries[3].accumulated_text, "");
        assert_eq!(state.recommendations, vec!["Sleep early".to_string()]);
        assert_eq!(state.summary(), "Rest Well. Drink water");
    }

    #[test]
    fn test_adopt_fallback_uses_final_summary() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        state.recommendations = vec!["Keep".to_string()];
        let response: HealthAssistResponse = serde_json::from_value(json!({
            "synthesized_guidance": "",
            "final_summary": "Take it easy"
        }))
        .unwrap();
        state.adopt_fallback(response);
        assert_eq!(state.summary(), "Take it easy");
        assert_eq!(state.recommendations, vec!["Keep".to_string()]);
    }

    #[test]
    fn test_adopt_empty_fallback_changes_nothing() {
        let mut state = ConversationTurnState::begin(1, "x", "");
        let before = state.clone();
        state.adopt_fallback(HealthAssistResponse::default());
        assert_eq!(state, before);
    }
}
