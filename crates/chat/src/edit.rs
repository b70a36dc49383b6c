use super::ids::PairId;

/// Draft for the one user turn being edited. Tracked by pair so it survives index shifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EditState {
    pub(crate) pair: PairId,
    pub(crate) draft: String,
}

impl EditState {
    pub(crate) fn new(pair: PairId, draft: impl Into<String>) -> Self {
        Self {
            pair,
            draft: draft.into(),
        }
    }
}

/// Read-only view of the edit state resolved to the current index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditView {
    pub index: usize,
    pub draft: String,
}
