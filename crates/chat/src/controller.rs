use std::collections::HashMap;
use std::sync::Arc;

use finscribe_answer::{AnswerRequest, AnswerService, DocumentCatalog, HistoryTurn};
use snafu::{OptionExt, ensure};
use tokio::sync::mpsc;

use super::context::{SessionContext, SessionSeed};
use super::edit::{EditState, EditView};
use super::error::{
    EmptyQuerySnafu, IndexOutOfRangeSnafu, InvalidRoleSnafu, NoActiveEditSnafu, SessionResult,
    TransportFailureSnafu,
};
use super::events::{Completion, CompletionDisposition, CompletionOutcome, SessionEvent};
use super::ids::{Generation, PairId, RequestToken};
use super::store::MessageStore;
use super::turn::{ANSWER_ERROR_MESSAGE, Role, Turn};

/// Request lifecycle of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    /// A live request will write into the pair whose user turn is at this index.
    AwaitingAnswer(usize),
}

/// Owns the turn history and reconciles answer completions with it.
///
/// Commands run synchronously; answer requests are spawned onto the Tokio runtime and report
/// back through a single completion mailbox (`next_completion` / `apply_completion`). The
/// owner drains that mailbox on the same task that issues commands, so every mutation of the
/// store is one serialized step.
///
/// Completions are correlated by [`RequestToken`]: the pair id survives index shifts, and
/// only the newest generation per pair is live. Clearing a pair or regenerating it retires
/// the old generation, so a late completion is dropped instead of landing in a reused slot.
pub struct SessionController {
    service: Arc<dyn AnswerService>,
    store: MessageStore,
    edit: Option<EditState>,
    seed: SessionSeed,
    documents: Vec<String>,
    in_flight: HashMap<PairId, Generation>,
    next_pair_id: PairId,
    next_generation: Generation,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    event_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionController {
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self::with_seed(service, SessionSeed::default())
    }

    pub fn with_seed(service: Arc<dyn AnswerService>, seed: SessionSeed) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            service,
            store: MessageStore::new(),
            edit: None,
            seed,
            documents: Vec::new(),
            in_flight: HashMap::new(),
            next_pair_id: PairId::new(1),
            next_generation: Generation::new(1),
            completion_tx,
            completion_rx,
            event_tx: None,
        }
    }

    /// Registers the presentation subscription. A later call replaces the earlier one.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_tx = Some(event_tx);
        event_rx
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.store.turns().to_vec()
    }

    pub fn turns(&self) -> &[Turn] {
        self.store.turns()
    }

    pub fn seed(&self) -> &SessionSeed {
        &self.seed
    }

    pub fn edit_state(&self) -> Option<EditView> {
        let edit = self.edit.as_ref()?;
        let index = self.store.user_index_of(edit.pair)?;
        Some(EditView {
            index,
            draft: edit.draft.clone(),
        })
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Replaces the cached document list; a degraded catalog raises one warning event.
    pub fn set_documents(&mut self, catalog: DocumentCatalog) {
        self.documents = catalog.documents;
        if let Some(message) = catalog.warning {
            self.emit(SessionEvent::DocumentsWarning { message });
        }
    }

    /// Number of live (not abandoned, not superseded) answer requests.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Request state of the pair containing the turn at `index`.
    pub fn request_state(&self, index: usize) -> SessionResult<RequestState> {
        let pair = self.store.get(index)?.pair;
        if !self.in_flight.contains_key(&pair) {
            return Ok(RequestState::Idle);
        }
        Ok(self
            .store
            .user_index_of(pair)
            .map_or(RequestState::Idle, RequestState::AwaitingAnswer))
    }

    pub fn is_awaiting(&self, index: usize) -> bool {
        matches!(
            self.request_state(index),
            Ok(RequestState::AwaitingAnswer(_))
        )
    }

    pub fn submit(&mut self, context: &SessionContext, text: &str) -> SessionResult<RequestToken> {
        const STAGE: &str = "submit";
        let user_id = context.identity(STAGE)?.to_string();
        ensure!(!text.trim().is_empty(), EmptyQuerySnafu { stage: STAGE });

        let history = self.history_snapshot();
        let pair = self.alloc_pair_id();
        let user_index = self.store.append(Turn::user(pair, text));
        self.store.append(Turn::assistant_pending(pair));
        tracing::debug!(pair = %pair, user_index, "appended query pair");

        Ok(self.issue_request(pair, text.to_string(), history, user_id))
    }

    /// Starts editing the user turn at `index` with `draft` as the initial text.
    ///
    /// Replaces any other edit in progress. The store is untouched until
    /// [`save_and_regenerate`](Self::save_and_regenerate).
    pub fn edit(&mut self, index: usize, draft: impl Into<String>) -> SessionResult<()> {
        let pair = self.user_turn(index, "edit")?.pair;
        self.edit = Some(EditState::new(pair, draft));
        Ok(())
    }

    /// Replaces the draft of the active edit. Returns false when nothing is being edited.
    pub fn update_draft(&mut self, draft: impl Into<String>) -> bool {
        match self.edit.as_mut() {
            Some(edit) => {
                edit.draft = draft.into();
                true
            }
            None => false,
        }
    }

    /// Drops the active edit without touching the store.
    pub fn cancel_edit(&mut self) -> bool {
        self.edit.take().is_some()
    }

    pub fn save_and_regenerate(
        &mut self,
        context: &SessionContext,
        index: usize,
    ) -> SessionResult<RequestToken> {
        const STAGE: &str = "save-and-regenerate";
        context.identity(STAGE)?;
        let edit = self
            .edit_state()
            .filter(|edit| edit.index == index)
            .context(NoActiveEditSnafu {
                stage: STAGE,
                index,
            })?;
        ensure!(!edit.draft.trim().is_empty(), EmptyQuerySnafu { stage: STAGE });

        let pair = self.user_turn(index, STAGE)?.pair;
        self.store.replace_at(index, Turn::user(pair, edit.draft))?;
        self.edit = None;
        self.regenerate(context, index)
    }

    /// Resets the answer of the user turn at `index` to pending and asks again.
    ///
    /// Any request already in flight for the pair is superseded.
    pub fn regenerate(
        &mut self,
        context: &SessionContext,
        index: usize,
    ) -> SessionResult<RequestToken> {
        const STAGE: &str = "regenerate";
        let user_id = context.identity(STAGE)?.to_string();
        let turn = self.user_turn(index, STAGE)?;
        let pair = turn.pair;
        let query = turn.content.text().unwrap_or_default().to_string();
        let history = self.history_snapshot();

        let pending = Turn::assistant_pending(pair);
        match self.store.assistant_index_of(pair) {
            Some(assistant_index) => self.store.replace_at(assistant_index, pending)?,
            None => {
                // An unanswered user turn can only be the last one.
                let len = self.store.len();
                ensure!(
                    index + 1 == len,
                    IndexOutOfRangeSnafu {
                        stage: STAGE,
                        index: index + 1,
                        len,
                    }
                );
                self.store.append(pending);
            }
        }

        Ok(self.issue_request(pair, query, history, user_id))
    }

    /// Removes the pair containing the turn at `index` (user or assistant side).
    pub fn clear(&mut self, index: usize) -> SessionResult<()> {
        const STAGE: &str = "clear";
        let turn = self.store.get(index)?;
        let pair = turn.pair;
        let user_index = match turn.role {
            Role::User => index,
            Role::Assistant => self
                .store
                .user_index_of(pair)
                .filter(|user_index| user_index + 1 == index)
                .context(InvalidRoleSnafu {
                    stage: STAGE,
                    index,
                    role: Role::Assistant,
                })?,
        };

        self.store.remove_pair(user_index)?;
        if let Some(generation) = self.in_flight.remove(&pair) {
            tracing::debug!(pair = %pair, generation = %generation, "abandoned in-flight request");
        }
        if self.edit.as_ref().is_some_and(|edit| edit.pair == pair) {
            self.edit = None;
        }
        debug_assert!(self.store.is_well_paired());
        Ok(())
    }

    /// Empties the session; every in-flight write-back is abandoned.
    pub fn clear_session(&mut self) {
        let abandoned = self.in_flight.len();
        self.store.clear();
        self.in_flight.clear();
        self.edit = None;
        tracing::debug!(abandoned, "cleared session");
    }

    /// Waits for the next settled answer request.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }

    /// Writes a settled answer into its pair, or drops it when its token is no longer live.
    pub fn apply_completion(&mut self, completion: Completion) -> CompletionDisposition {
        let Completion { token, outcome } = completion;
        if self.in_flight.get(&token.pair) != Some(&token.generation) {
            tracing::debug!(token = %token, "discarding stale completion");
            return CompletionDisposition::Discarded;
        }
        self.in_flight.remove(&token.pair);

        let Some(index) = self.store.assistant_index_of(token.pair) else {
            tracing::warn!(token = %token, "live request lost its assistant turn; discarding");
            return CompletionDisposition::Discarded;
        };

        let (turn, event) = match outcome {
            CompletionOutcome::Answered(response) => {
                let event = SessionEvent::AnswerResolved {
                    pair: token.pair,
                    index,
                    document_name: response.document_name.clone(),
                };
                (Turn::assistant_answer(token.pair, response), event)
            }
            CompletionOutcome::Failed(error) => {
                tracing::warn!(token = %token, error = %error, "answer request failed");
                let event = SessionEvent::AnswerFailed {
                    pair: token.pair,
                    index,
                    error,
                };
                (Turn::assistant_error(token.pair, ANSWER_ERROR_MESSAGE), event)
            }
        };

        if let Err(error) = self.store.replace_at(index, turn) {
            tracing::warn!(token = %token, error = %error, "failed to write completion");
            return CompletionDisposition::Discarded;
        }
        tracing::debug!(token = %token, index, "applied completion");
        self.emit(event);
        CompletionDisposition::Applied(index)
    }

    fn user_turn(&self, index: usize, stage: &'static str) -> SessionResult<&Turn> {
        let turn = self.store.get(index)?;
        ensure!(
            turn.is_user(),
            InvalidRoleSnafu {
                stage,
                index,
                role: turn.role,
            }
        );
        Ok(turn)
    }

    /// The whole session as it stands before the calling command changes it.
    fn history_snapshot(&self) -> Vec<HistoryTurn> {
        self.store.turns().iter().map(Turn::to_history).collect()
    }

    fn issue_request(
        &mut self,
        pair: PairId,
        query: String,
        history: Vec<HistoryTurn>,
        user_id: String,
    ) -> RequestToken {
        let generation = self.alloc_generation();
        let token = RequestToken::new(pair, generation);
        if let Some(superseded) = self.in_flight.insert(pair, generation) {
            tracing::debug!(pair = %pair, superseded = %superseded, "superseding in-flight request");
        }

        let request = AnswerRequest::new(query, history, user_id)
            .with_processing_id(self.seed.processing_id.clone());
        tracing::debug!(
            token = %token,
            correlation_id = %request.correlation_id,
            "issuing answer request"
        );

        let answer = self.service.answer(request);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let outcome = match answer.await {
                Ok(response) => CompletionOutcome::Answered(response),
                Err(error) => CompletionOutcome::Failed(
                    TransportFailureSnafu {
                        stage: "answer-request",
                        message: error.to_string(),
                    }
                    .build(),
                ),
            };
            // The controller may already be gone; its session no longer exists then.
            let _ = completion_tx.send(Completion { token, outcome });
        });

        token
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(event_tx) = &self.event_tx {
            let _ = event_tx.send(event);
        }
    }

    fn alloc_pair_id(&mut self) -> PairId {
        let pair = self.next_pair_id;
        self.next_pair_id = pair.next();
        pair
    }

    fn alloc_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        generation
    }
}
