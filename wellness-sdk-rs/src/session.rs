use crate::client::{Backend, HttpBackend};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::frame::FrameParser;
use crate::models::{FollowUpRequest, HealthAssistResponse, TurnRequest};
use crate::turn::{
    ConversationTurnState, FollowUpState, STATUS_FOLLOW_UP_FAILED, STATUS_GENERIC_FAILURE,
    STATUS_NEED_SYMPTOMS, STATUS_STREAM_FAILED, STATUS_THINKING, TurnPhase,
};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a call to [`ChatSession::submit`] ended.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The stream produced a result on its own.
    Completed,
    /// The non-streaming request supplied the result.
    CompletedViaFallback,
    /// Both the stream and the fallback failed; the status says why.
    Failed,
    /// Nothing was sent because the input was invalid.
    Rejected,
    /// Superseded by a newer turn or cancelled explicitly.
    Cancelled,
}

enum StreamEnd {
    Finished,
    Cancelled,
}

#[derive(Clone)]
struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionCore {
    state: ConversationTurnState,
    active: Option<ActiveTurn>,
    last_turn_id: u64,
    follow_up: FollowUpState,
    observer: Option<mpsc::UnboundedSender<ConversationTurnState>>,
}

impl SessionCore {
    fn publish(&mut self) {
        if let Some(observer) = &self.observer {
            if observer.send(self.state.clone()).is_err() {
                self.observer = None;
            }
        }
    }

    fn owns(&self, turn: &ActiveTurn) -> bool {
        !turn.cancel.is_cancelled() && self.state.turn_id == turn.id
    }
}

struct SessionInner {
    backend: Arc<dyn Backend>,
    user_id: String,
    core: RwLock<SessionCore>,
}

/// Drives conversation turns against a [`Backend`].
///
/// Cloning yields another handle to the same session. At most one turn is
/// live at a time: submitting cancels the previous turn before its state is
/// replaced, and every write checks that the writer still owns the state.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, user_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                user_id: user_id.into(),
                core: RwLock::new(SessionCore::default()),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let user_id = config.user_id.clone();
        Self::new(Arc::new(HttpBackend::new(config.clone())), user_id)
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Returns a receiver that gets a snapshot after every state change.
    /// Subscribing again replaces the previous receiver.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<ConversationTurnState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.core.write().await.observer = Some(tx);
        rx
    }

    pub async fn snapshot(&self) -> ConversationTurnState {
        self.inner.core.read().await.state.clone()
    }

    pub async fn follow_up_snapshot(&self) -> FollowUpState {
        self.inner.core.read().await.follow_up.clone()
    }

    pub async fn is_generating(&self) -> bool {
        self.inner.core.read().await.state.generating
    }

    /// Stops the live turn, if any. Its partial state is kept.
    pub async fn cancel(&self) {
        let mut core = self.inner.core.write().await;
        if let Some(turn) = core.active.take() {
            info!("Cancelling turn {}", turn.id);
            turn.cancel.cancel();
            core.state.generating = false;
            core.publish();
        }
    }

    /// Runs one turn to completion.
    ///
    /// Errors never escape: they end up in the status message of the state.
    pub async fn submit(&self, symptoms: &str, medical_report: &str) -> TurnOutcome {
        if symptoms.trim().is_empty() {
            let mut core = self.inner.core.write().await;
            core.state.status_message = STATUS_NEED_SYMPTOMS.to_string();
            core.publish();
            return TurnOutcome::Rejected;
        }

        let turn = self.begin_turn(symptoms, medical_report).await;
        info!("Turn {} started", turn.id);

        let request = TurnRequest {
            symptoms: symptoms.to_string(),
            medical_report: medical_report.to_string(),
            user_id: self.inner.user_id.clone(),
        };

        let outcome = match self.stream_turn(&turn, &request).await {
            Ok(StreamEnd::Finished) => self.finish_stream(&turn, &request).await,
            Ok(StreamEnd::Cancelled) => TurnOutcome::Cancelled,
            Err(e) => self.recover_from_stream_error(&turn, &request, e).await,
        };
        let outcome = if turn.cancel.is_cancelled() {
            TurnOutcome::Cancelled
        } else {
            outcome
        };

        self.end_turn(&turn).await;
        info!("Turn {} ended: {:?}", turn.id, outcome);
        outcome
    }

    /// Sends a follow-up question about the latest guidance.
    ///
    /// Blank questions are ignored. Independent of turn cancellation.
    pub async fn ask_follow_up(&self, question: &str) -> FollowUpState {
        if question.trim().is_empty() {
            return self.follow_up_snapshot().await;
        }

        {
            let mut core = self.inner.core.write().await;
            core.follow_up.question = question.to_string();
            core.follow_up.status_message = STATUS_THINKING.to_string();
            core.follow_up.pending = true;
        }

        let request = FollowUpRequest {
            user_id: self.inner.user_id.clone(),
            question: question.to_string(),
        };
        let result = self.inner.backend.follow_up(&request).await;

        let mut core = self.inner.core.write().await;
        let follow_up = &mut core.follow_up;
        follow_up.pending = false;
        match result {
            Ok(response) => {
                follow_up.answer = response.answer.unwrap_or_default();
                follow_up.status_message.clear();
            }
            Err(e) => {
                warn!("Follow-up failed: {}", e);
                follow_up.status_message = e
                    .user_message()
                    .unwrap_or(STATUS_FOLLOW_UP_FAILED)
                    .to_string();
            }
        }
        follow_up.clone()
    }

    async fn begin_turn(&self, symptoms: &str, medical_report: &str) -> ActiveTurn {
        let mut core = self.inner.core.write().await;
        if let Some(previous) = core.active.take() {
            debug!("Superseding turn {}", previous.id);
            previous.cancel.cancel();
        }
        core.last_turn_id += 1;
        let turn = ActiveTurn {
            id: core.last_turn_id,
            cancel: CancellationToken::new(),
        };
        core.state = ConversationTurnState::begin(turn.id, symptoms, medical_report);
        core.active = Some(turn.clone());
        core.publish();
        turn
    }

    async fn end_turn(&self, turn: &ActiveTurn) {
        let mut core = self.inner.core.write().await;
        if core.active.as_ref().is_some_and(|active| active.id == turn.id) {
            core.active = None;
        }
        if core.owns(turn) {
            core.state.generating = false;
            core.publish();
        }
    }

    /// Applies `update` if `turn` still owns the state. Returns false when
    /// the turn is stale, in which case nothing was written.
    async fn mutate(
        &self,
        turn: &ActiveTurn,
        update: impl FnOnce(&mut ConversationTurnState),
    ) -> bool {
        let mut core = self.inner.core.write().await;
        if !core.owns(turn) {
            debug!("Dropping write from stale turn {}", turn.id);
            return false;
        }
        update(&mut core.state);
        core.publish();
        true
    }

    async fn stream_turn(&self, turn: &ActiveTurn, request: &TurnRequest) -> Result<StreamEnd> {
        let mut stream = tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            opened = self.inner.backend.open_stream(request) => opened?,
        };

        let mut parser = FrameParser::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = turn.cancel.cancelled() => {
                    drop(stream);
                    return Ok(StreamEnd::Cancelled);
                }
                next = stream.next() => next,
            };

            let chunk = match next {
                Some(chunk) => chunk?,
                None => break,
            };
            let records = parser.push_bytes(&chunk);
            if records.is_empty() {
                continue;
            }
            let applied = self
                .mutate(turn, |state| {
                    for record in records {
                        state.apply_record(record);
                    }
                })
                .await;
            if !applied {
                return Ok(StreamEnd::Cancelled);
            }
        }
        drop(stream);

        let records = parser.finish();
        if !records.is_empty() {
            debug!("Flushing {} trailing record(s)", records.len());
            let applied = self
                .mutate(turn, |state| {
                    for record in records {
                        state.apply_record(record);
                    }
                })
                .await;
            if !applied {
                return Ok(StreamEnd::Cancelled);
            }
        }
        Ok(StreamEnd::Finished)
    }

    async fn finish_stream(&self, turn: &ActiveTurn, request: &TurnRequest) -> TurnOutcome {
        let mut needs_fallback = false;
        let live = self
            .mutate(turn, |state| {
                needs_fallback = !state.has_result();
                state.phase = if needs_fallback {
                    TurnPhase::Fallback
                } else {
                    TurnPhase::Completed
                };
                if !needs_fallback {
                    state.status_message.clear();
                }
            })
            .await;
        if !live {
            return TurnOutcome::Cancelled;
        }
        if !needs_fallback {
            return TurnOutcome::Completed;
        }

        info!("Turn {} streamed no result, requesting fallback", turn.id);
        let Some(result) = self.fallback(turn, request).await else {
            return TurnOutcome::Cancelled;
        };
        let adopted = match result {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Ignoring fallback failure: {}", e);
                None
            }
        };
        let via_fallback = adopted.is_some();
        self.mutate(turn, |state| {
            if let Some(response) = adopted {
                state.adopt_fallback(response);
            }
            state.status_message.clear();
            state.phase = TurnPhase::Completed;
        })
        .await;

        if via_fallback {
            TurnOutcome::CompletedViaFallback
        } else {
            TurnOutcome::Completed
        }
    }

    async fn recover_from_stream_error(
        &self,
        turn: &ActiveTurn,
        request: &TurnRequest,
        error: ClientError,
    ) -> TurnOutcome {
        warn!("Streaming failed for turn {}: {}", turn.id, error);
        let live = self
            .mutate(turn, |state| {
                state.status_message = STATUS_STREAM_FAILED.to_string();
                state.phase = TurnPhase::Fallback;
            })
            .await;
        if !live {
            return TurnOutcome::Cancelled;
        }

        match self.fallback(turn, request).await {
            None => TurnOutcome::Cancelled,
            Some(Ok(response)) => {
                self.mutate(turn, |state| {
                    state.adopt_fallback(response);
                    state.status_message.clear();
                    state.phase = TurnPhase::Completed;
                })
                .await;
                TurnOutcome::CompletedViaFallback
            }
            Some(Err(e)) => {
                warn!("Fallback failed for turn {}: {}", turn.id, e);
                let message = e.user_message().unwrap_or(STATUS_GENERIC_FAILURE).to_string();
                self.mutate(turn, |state| {
                    state.status_message = message;
                    state.phase = TurnPhase::Failed;
                })
                .await;
                TurnOutcome::Failed
            }
        }
    }

    /// The non-streaming request, or `None` if the turn was cancelled first.
    async fn fallback(
        &self,
        turn: &ActiveTurn,
        request: &TurnRequest,
    ) -> Option<Result<HealthAssistResponse>> {
        tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => None,
            result = self.inner.backend.health_assist(request) => Some(result),
        }
    }
}
