pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod logger;
pub mod models;
pub mod normalize;
pub mod session;
pub mod transcript;
pub mod turn;

pub use client::{Backend, HttpBackend};
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::{ChatSession, TurnOutcome};
pub use turn::{ConversationTurnState, FollowUpState, TurnPhase};
