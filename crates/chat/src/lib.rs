pub mod context;
pub mod controller;
pub mod edit;
pub mod error;
pub mod events;
pub mod ids;
pub mod store;
pub mod transcript;
pub mod turn;

pub use context::{SessionContext, SessionSeed};
pub use controller::{RequestState, SessionController};
pub use edit::EditView;
pub use error::{SessionError, SessionResult};
pub use events::{Completion, CompletionDisposition, CompletionOutcome, SessionEvent};
pub use ids::{Generation, PairId, RequestToken};
pub use store::MessageStore;
pub use turn::{ANSWER_ERROR_MESSAGE, Role, Turn, TurnContent};
