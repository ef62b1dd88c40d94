//! Per-user consumption histories.
//!
//! [`UserConsumed`] stores every user's consumed items in chronological order
//! in one flat buffer addressed by per-user pointers.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{RecoError, Result};
use crate::{ItemId, Timestamp, UserId};

/// A single (user, item, timestamp) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interaction {
    /// The consuming user.
    pub user: UserId,
    /// The consumed item.
    pub item: ItemId,
    /// When the item was consumed.
    pub timestamp: Timestamp,
}

impl Interaction {
    /// Creates an interaction.
    pub fn new(user: UserId, item: ItemId, timestamp: Timestamp) -> Self {
        Self {
            user,
            item,
            timestamp,
        }
    }
}

fn cmp_user_timestamp(x: &Interaction, y: &Interaction) -> Ordering {
    x.user
        .cmp(&y.user)
        .then_with(|| x.timestamp.cmp(&y.timestamp))
}

/// Read access to chronological per-user item lists.
pub trait UserHistory {
    /// Number of users with an addressable history.
    fn n_users(&self) -> usize;

    /// Items consumed by `user`, oldest first. Unknown users have no history.
    fn consumed(&self, user: UserId) -> &[ItemId];
}

/// Compressed chronological histories of all users.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserConsumed {
    n_users: usize,
    n_items: usize,
    user_pointers: Vec<usize>,
    item_ids: Vec<ItemId>,
}

impl UserConsumed {
    /// Builds histories from unordered interactions.
    ///
    /// Interactions of the same user are ordered by timestamp; equal
    /// timestamps keep their input order.
    ///
    /// # Errors
    ///
    /// Returns [`RecoError::IndexOutOfRange`] if an interaction references a
    /// user `>= n_users` or an item `>= n_items`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreco_core::history::{Interaction, UserConsumed, UserHistory};
    ///
    /// let consumed = UserConsumed::from_interactions(
    ///     2,
    ///     5,
    ///     &[
    ///         Interaction::new(1, 4, 20),
    ///         Interaction::new(1, 2, 10),
    ///         Interaction::new(0, 3, 5),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(consumed.consumed(1), &[2, 4]);
    /// ```
    pub fn from_interactions(
        n_users: usize,
        n_items: usize,
        interactions: &[Interaction],
    ) -> Result<Self> {
        for datum in interactions {
            if datum.user >= n_users {
                return Err(RecoError::IndexOutOfRange {
                    what: "user".to_string(),
                    index: datum.user,
                    size: n_users,
                });
            }
            if datum.item >= n_items {
                return Err(RecoError::IndexOutOfRange {
                    what: "item".to_string(),
                    index: datum.item,
                    size: n_items,
                });
            }
        }

        let mut data = interactions.to_vec();
        data.sort_by(cmp_user_timestamp);

        let mut user_pointers = vec![0; n_users + 1];
        let mut item_ids = Vec::with_capacity(data.len());
        for datum in &data {
            item_ids.push(datum.item);
            user_pointers[datum.user + 1] += 1;
        }
        for idx in 1..user_pointers.len() {
            user_pointers[idx] += user_pointers[idx - 1];
        }

        Ok(Self {
            n_users,
            n_items,
            user_pointers,
            item_ids,
        })
    }

    /// Number of items in the catalog the histories refer to.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Total number of stored interactions.
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// Returns true if no interaction is stored.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

impl UserHistory for UserConsumed {
    fn n_users(&self) -> usize {
        self.n_users
    }

    fn consumed(&self, user: UserId) -> &[ItemId] {
        if user >= self.n_users {
            return &[];
        }
        let start = self.user_pointers[user];
        let stop = self.user_pointers[user + 1];
        &self.item_ids[start..stop]
    }
}

impl UserHistory for Vec<Vec<ItemId>> {
    fn n_users(&self) -> usize {
        self.len()
    }

    fn consumed(&self, user: UserId) -> &[ItemId] {
        self.get(user).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histories_are_chronological() {
        let interactions = vec![
            Interaction::new(0, 3, 30),
            Interaction::new(2, 1, 5),
            Interaction::new(0, 1, 10),
            Interaction::new(0, 2, 20),
        ];
        let consumed = UserConsumed::from_interactions(3, 4, &interactions).unwrap();

        assert_eq!(consumed.n_users(), 3);
        assert_eq!(consumed.len(), 4);
        assert_eq!(consumed.consumed(0), &[1, 2, 3]);
        assert!(consumed.consumed(1).is_empty());
        assert_eq!(consumed.consumed(2), &[1]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let interactions = vec![
            Interaction::new(0, 2, 7),
            Interaction::new(0, 0, 7),
            Interaction::new(0, 1, 7),
        ];
        let consumed = UserConsumed::from_interactions(1, 3, &interactions).unwrap();
        assert_eq!(consumed.consumed(0), &[2, 0, 1]);
    }

    #[test]
    fn test_unknown_user_has_empty_history() {
        let consumed = UserConsumed::from_interactions(1, 1, &[]).unwrap();
        assert!(consumed.is_empty());
        assert!(consumed.consumed(5).is_empty());

        let nested: Vec<Vec<ItemId>> = vec![vec![1, 2]];
        assert_eq!(nested.consumed(0), &[1, 2]);
        assert!(nested.consumed(1).is_empty());
    }

    #[test]
    fn test_out_of_range_ids_are_rejected() {
        let err = UserConsumed::from_interactions(2, 2, &[Interaction::new(2, 0, 0)]).unwrap_err();
        assert!(matches!(err, RecoError::IndexOutOfRange { index: 2, .. }));

        let err = UserConsumed::from_interactions(2, 2, &[Interaction::new(0, 9, 0)]).unwrap_err();
        assert!(matches!(err, RecoError::IndexOutOfRange { size: 2, .. }));
    }
}
