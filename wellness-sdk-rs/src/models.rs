use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of both `POST /chat_stream` and `POST /health-assist`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub symptoms: String,
    pub medical_report: String,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HealthAssistResponse {
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    /// A string, or an object carrying `synthesized_guidance` or `text`.
    #[serde(default)]
    pub synthesized_guidance: Option<Value>,
    #[serde(default)]
    pub final_summary: Option<Value>,
    #[serde(default)]
    pub agent_flow: Option<Vec<AgentFlowStep>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentFlowStep {
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub output: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FollowUpRequest {
    pub user_id: String,
    pub question: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FollowUpResponse {
    #[serde(default)]
    pub answer: Option<String>,
}
