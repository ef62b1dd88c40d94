//! Bounded per-user interaction windows.
//!
//! A window holds up to `window_size` item ids of a user's history, either the
//! most recent ones or a uniform random sample, always in chronological order.
//! Windows are emitted as a [`SparseIncidence`], the input of sparse pooling.

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{RecoError, Result};
use crate::history::UserHistory;
use crate::{ItemId, UserId};

/// Default window length when neither mode is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// How items are picked from a history longer than the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeqMode {
    /// The last `window_size` items.
    #[default]
    Recent,
    /// `window_size` items sampled uniformly without replacement.
    Random,
}

impl fmt::Display for SeqMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqMode::Recent => f.write_str("recent"),
            SeqMode::Random => f.write_str("random"),
        }
    }
}

/// Resolves the window mode and length from the two optional settings.
///
/// `recent_num` wins when set, then `random_num`; with neither the window is
/// the 10 most recent items.
///
/// # Errors
///
/// Returns [`RecoError::ConfigError`] if the selected length is zero.
pub fn seq_mode(recent_num: Option<usize>, random_num: Option<usize>) -> Result<(SeqMode, usize)> {
    let (mode, size) = match (recent_num, random_num) {
        (Some(n), _) => (SeqMode::Recent, n),
        (None, Some(n)) => (SeqMode::Random, n),
        (None, None) => (SeqMode::Recent, DEFAULT_WINDOW_SIZE),
    };
    if size == 0 {
        return Err(RecoError::config(format!(
            "{mode} window size must be positive"
        )));
    }
    Ok((mode, size))
}

/// Sparse `(rows, n_items)` incidence matrix in coordinate form.
///
/// Entry `k` maps output row `indices[k][0]` to item `values[k]`. The second
/// coordinate is always zero; only the row and the value are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparseIncidence {
    /// `(row, 0)` coordinate pairs, grouped by row in ascending order.
    pub indices: Vec<[usize; 2]>,
    /// Item id of every entry.
    pub values: Vec<ItemId>,
    /// `[rows, n_items]`.
    pub dense_shape: [usize; 2],
}

impl SparseIncidence {
    /// Number of output rows.
    pub fn num_rows(&self) -> usize {
        self.dense_shape[0]
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Item ids mapped to `row`, in stored order.
    pub fn row_values(&self, row: usize) -> Vec<ItemId> {
        self.indices
            .iter()
            .zip(&self.values)
            .filter(|(idx, _)| idx[0] == row)
            .map(|(_, &v)| v)
            .collect()
    }
}

/// Picks the window of one history.
fn window(history: &[ItemId], mode: SeqMode, window_size: usize, rng: &mut StdRng) -> Vec<ItemId> {
    if history.len() <= window_size {
        return history.to_vec();
    }
    match mode {
        SeqMode::Recent => history[history.len() - window_size..].to_vec(),
        SeqMode::Random => {
            let mut positions = index::sample(rng, history.len(), window_size).into_vec();
            positions.sort_unstable();
            positions.into_iter().map(|p| history[p]).collect()
        }
    }
}

/// Builds the interaction windows of `users`.
///
/// Row `r` of the result holds the window of `users[r]`. Users without
/// history, or unknown to `histories`, get no entries. Random sampling draws
/// from a generator seeded with `seed`, so equal inputs give equal windows.
///
/// # Errors
///
/// Returns [`RecoError::ConfigError`] if `window_size` is zero.
///
/// # Examples
///
/// ```
/// use libreco_core::sequence::{build_windows, SeqMode};
///
/// let histories = vec![vec![4, 5, 6], vec![]];
/// let windows = build_windows(&histories, &[0, 1], 2, SeqMode::Recent, 2, 0).unwrap();
/// assert_eq!(windows.indices, vec![[0, 0], [0, 0]]);
/// assert_eq!(windows.values, vec![5, 6]);
/// assert_eq!(windows.dense_shape, [2, 2]);
/// ```
pub fn build_windows<H: UserHistory + ?Sized>(
    histories: &H,
    users: &[UserId],
    n_items: usize,
    mode: SeqMode,
    window_size: usize,
    seed: u64,
) -> Result<SparseIncidence> {
    if window_size == 0 {
        return Err(RecoError::config("window size must be positive"));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = Vec::new();
    let mut values = Vec::new();
    for (row, &user) in users.iter().enumerate() {
        for item in window(histories.consumed(user), mode, window_size, &mut rng) {
            indices.push([row, 0]);
            values.push(item);
        }
    }

    tracing::debug!(
        users = users.len(),
        entries = values.len(),
        mode = %mode,
        window_size,
        "built interaction windows"
    );
    Ok(SparseIncidence {
        indices,
        values,
        dense_shape: [users.len(), n_items],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_history() -> Vec<Vec<ItemId>> {
        vec![(0..15).map(|i| 100 + i).collect()]
    }

    #[test]
    fn test_recent_window_truncates() {
        let histories = long_history();
        let windows = build_windows(&histories, &[0], 200, SeqMode::Recent, 10, 0).unwrap();
        let expected: Vec<ItemId> = (105..115).collect();
        assert_eq!(windows.values, expected);
        assert!(windows.indices.iter().all(|idx| *idx == [0, 0]));
    }

    #[test]
    fn test_short_history_is_kept_whole() {
        let histories = long_history();
        for mode in [SeqMode::Recent, SeqMode::Random] {
            let windows = build_windows(&histories, &[0], 200, mode, 20, 3).unwrap();
            assert_eq!(windows.values, histories[0]);
        }
    }

    #[test]
    fn test_random_window_is_ordered_and_seeded() {
        let histories = long_history();
        let a = build_windows(&histories, &[0, 0], 200, SeqMode::Random, 5, 42).unwrap();
        let b = build_windows(&histories, &[0, 0], 200, SeqMode::Random, 5, 42).unwrap();
        assert_eq!(a, b);

        for row in 0..2 {
            let values = a.row_values(row);
            assert_eq!(values.len(), 5);
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            assert!(values.iter().all(|v| histories[0].contains(v)));
        }
    }

    #[test]
    fn test_empty_and_unknown_users_have_no_rows() {
        let histories: Vec<Vec<ItemId>> = vec![vec![], vec![1, 2]];
        let windows = build_windows(&histories, &[0, 7, 1], 3, SeqMode::Recent, 4, 0).unwrap();
        assert_eq!(windows.num_rows(), 3);
        assert_eq!(windows.nnz(), 2);
        assert!(windows.row_values(0).is_empty());
        assert!(windows.row_values(1).is_empty());
        assert_eq!(windows.row_values(2), vec![1, 2]);
    }

    #[test]
    fn test_zero_window_is_a_config_error() {
        let histories = long_history();
        assert!(matches!(
            build_windows(&histories, &[0], 200, SeqMode::Recent, 0, 0),
            Err(RecoError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_seq_mode_resolution() {
        assert_eq!(seq_mode(Some(3), Some(5)).unwrap(), (SeqMode::Recent, 3));
        assert_eq!(seq_mode(None, Some(5)).unwrap(), (SeqMode::Random, 5));
        assert_eq!(seq_mode(None, None).unwrap(), (SeqMode::Recent, 10));
        assert!(seq_mode(Some(0), None).is_err());
        assert!(seq_mode(None, Some(0)).is_err());
    }
}
