//! Top-n selection shared by the recommenders.

use std::collections::HashSet;

use libreco_core::ItemId;

/// Ranks candidate items by descending score, breaking ties by lower id.
///
/// `scores[i]` is the score of item `i`; items in `exclude` are skipped.
pub(crate) fn top_n(scores: &[f32], exclude: &HashSet<ItemId>, n: usize) -> Vec<(ItemId, f32)> {
    let mut ranked: Vec<(ItemId, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(item, _)| !exclude.contains(item))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_breaks_ties_by_id() {
        let scores = [0.5, 0.9, 0.5, 0.9, 0.1];
        let exclude: HashSet<ItemId> = [1].into_iter().collect();
        let ranked = top_n(&scores, &exclude, 3);
        assert_eq!(ranked, vec![(3, 0.9), (0, 0.5), (2, 0.5)]);
        assert!(top_n(&scores, &HashSet::new(), 0).is_empty());
    }

    #[test]
    fn test_top_n_with_everything_excluded() {
        let exclude: HashSet<ItemId> = (0..3).collect();
        assert!(top_n(&[1.0, 2.0, 3.0], &exclude, 2).is_empty());
        assert_eq!(top_n(&[1.0, 2.0], &HashSet::new(), 10).len(), 2);
    }
}
