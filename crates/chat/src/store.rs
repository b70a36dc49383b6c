use snafu::OptionExt;

use super::error::{IndexOutOfRangeSnafu, SessionResult};
use super::ids::PairId;
use super::turn::{Role, Turn};

/// Ordered turn sequence with index-checked structural operations.
///
/// Callers append in user/assistant pairs; indices are only meaningful until the next
/// `remove_pair`, so long-lived references go through `PairId` lookups instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    turns: Vec<Turn>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Appends `turn` and returns its index.
    pub fn append(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    pub fn get(&self, index: usize) -> SessionResult<&Turn> {
        let len = self.turns.len();
        self.turns.get(index).context(IndexOutOfRangeSnafu {
            stage: "store-get",
            index,
            len,
        })
    }

    pub fn replace_at(&mut self, index: usize, turn: Turn) -> SessionResult<()> {
        let len = self.turns.len();
        let slot = self.turns.get_mut(index).context(IndexOutOfRangeSnafu {
            stage: "store-replace-at",
            index,
            len,
        })?;
        *slot = turn;
        Ok(())
    }

    /// Removes the turn at `user_index` and its successor when the successor belongs to
    /// the same pair. Everything after shifts down by one or two.
    pub fn remove_pair(&mut self, user_index: usize) -> SessionResult<()> {
        let pair = self.get(user_index)?.pair;
        let end = match self.turns.get(user_index + 1) {
            Some(next) if next.pair == pair => user_index + 2,
            _ => user_index + 1,
        };
        self.turns.drain(user_index..end);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Current index of the user turn of `pair`.
    pub fn user_index_of(&self, pair: PairId) -> Option<usize> {
        self.turns
            .iter()
            .position(|turn| turn.pair == pair && turn.role == Role::User)
    }

    /// Current index of the assistant turn of `pair`.
    pub fn assistant_index_of(&self, pair: PairId) -> Option<usize> {
        let user_index = self.user_index_of(pair)?;
        self.turns
            .get(user_index + 1)
            .filter(|turn| turn.pair == pair && turn.role == Role::Assistant)
            .map(|_| user_index + 1)
    }

    /// Checks pairing: user turns sit on even positions, each followed by its own assistant
    /// turn except possibly the last, and no pair has two assistant turns.
    pub fn is_well_paired(&self) -> bool {
        let mut chunks = self.turns.chunks(2).peekable();
        while let Some(chunk) = chunks.next() {
            match chunk {
                [user, assistant] => {
                    if user.role != Role::User
                        || assistant.role != Role::Assistant
                        || user.pair != assistant.pair
                    {
                        return false;
                    }
                }
                [user] => {
                    if user.role != Role::User || chunks.peek().is_some() {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::turn::TurnContent;

    fn store_with_pairs(count: u64) -> MessageStore {
        let mut store = MessageStore::new();
        for raw in 1..=count {
            let pair = PairId::new(raw);
            store.append(Turn::user(pair, format!("question {raw}")));
            store.append(Turn::assistant_error(pair, format!("answer {raw}")));
        }
        store
    }

    #[test]
    fn append_returns_new_index() {
        let mut store = MessageStore::new();
        assert_eq!(store.append(Turn::user(PairId::new(1), "hi")), 0);
        assert_eq!(store.append(Turn::assistant_pending(PairId::new(1))), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut store = store_with_pairs(1);
        assert_eq!(
            store.get(2).unwrap_err(),
            SessionError::IndexOutOfRange {
                stage: "store-get",
                index: 2,
                len: 2
            }
        );
        assert!(matches!(
            store.replace_at(5, Turn::assistant_pending(PairId::new(1))),
            Err(SessionError::IndexOutOfRange { index: 5, .. })
        ));
        assert!(matches!(
            store.remove_pair(7),
            Err(SessionError::IndexOutOfRange { index: 7, .. })
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replace_at_keeps_neighbours() {
        let mut store = store_with_pairs(2);
        store
            .replace_at(1, Turn::assistant_pending(PairId::new(1)))
            .unwrap();
        assert!(store.get(1).unwrap().content.is_pending());
        assert_eq!(
            store.get(2).unwrap().content,
            TurnContent::Text("question 2".to_string())
        );
    }

    #[test]
    fn removing_middle_pair_shifts_later_turns_down() {
        let mut store = store_with_pairs(3);
        let before = store.turns().to_vec();

        store.remove_pair(2).unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.turns()[0..2], before[0..2]);
        assert_eq!(store.turns()[2..4], before[4..6]);
        assert!(store.is_well_paired());
    }

    #[test]
    fn remove_pair_leaves_foreign_successor() {
        let mut store = MessageStore::new();
        store.append(Turn::user(PairId::new(1), "unanswered"));
        store.append(Turn::user(PairId::new(2), "next"));
        store.remove_pair(0).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().pair, PairId::new(2));
    }

    #[test]
    fn pair_lookup_follows_shifts() {
        let mut store = store_with_pairs(3);
        assert_eq!(store.assistant_index_of(PairId::new(3)), Some(5));
        store.remove_pair(0).unwrap();
        assert_eq!(store.user_index_of(PairId::new(3)), Some(2));
        assert_eq!(store.assistant_index_of(PairId::new(3)), Some(3));
        assert_eq!(store.user_index_of(PairId::new(1)), None);
    }

    #[test]
    fn detects_broken_pairing() {
        let mut store = store_with_pairs(1);
        assert!(store.is_well_paired());
        store.append(Turn::assistant_pending(PairId::new(9)));
        assert!(!store.is_well_paired());

        let mut trailing_user = store_with_pairs(1);
        trailing_user.append(Turn::user(PairId::new(2), "waiting"));
        assert!(trailing_user.is_well_paired());
    }
}
