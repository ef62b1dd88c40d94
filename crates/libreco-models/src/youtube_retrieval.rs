//! Two-tower retrieval in the style of the YouTube candidate generator.
//!
//! The user tower pools the embeddings of a window of recently consumed
//! items, appends the user's side features and runs the result through a
//! dense stack. Items are represented by the output weights and biases of the
//! softmax over all items. Once both sides are materialized by
//! [`YouTubeRetrieval::set_embeddings`], recommendation is a dot product.

use std::collections::HashSet;
use std::ops::Range;

use libreco_core::{
    build_windows, resolve, Combiner, DenseBatch, FeatureCatalog, FieldSizes, IndexBatch, ItemId,
    SparseIncidence, UserHistory, UserId,
};
use libreco_layers::prelude::*;

use crate::batch::FeatureBatch;
use crate::config::YouTubeRetrievalConfig;
use crate::error::{ModelError, ModelResult};
use crate::ranking::top_n;

/// User and item vectors, each with one extra column folding in the item bias.
#[derive(Debug, Clone)]
struct Embeddings {
    users: Tensor,
    items: Tensor,
}

/// YouTube-style retrieval model.
#[derive(Debug, Clone)]
pub struct YouTubeRetrieval {
    config: YouTubeRetrievalConfig,
    sizes: FieldSizes,
    n_users: usize,
    n_items: usize,
    windows: SparseIncidence,
    window_ranges: Vec<Range<usize>>,
    consumed: Vec<Vec<ItemId>>,
    item_interaction: EmbeddingTable,
    sparse: Option<SparseEmbedding>,
    dense: Option<DenseFieldEmbedding>,
    tower: MLP,
    softmax_weights: Tensor,
    softmax_biases: Tensor,
    embeddings: Option<Embeddings>,
}

impl YouTubeRetrieval {
    /// Builds the model and the interaction window of every user.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or the
    /// catalog declares item-side features.
    pub fn new<H: UserHistory + ?Sized>(
        catalog: &FeatureCatalog,
        histories: &H,
        config: YouTubeRetrievalConfig,
    ) -> ModelResult<Self> {
        config.validate()?;
        if catalog.has_item_features() {
            return Err(ModelError::config(
                "YouTube retrieval cannot use item features",
            ));
        }
        let sizes = resolve(catalog, config.multi_sparse_combiner)?;
        let n_users = catalog.n_users();
        let n_items = catalog.n_items();

        let (mode, window_size) = config.window()?;
        let users: Vec<UserId> = (0..n_users).collect();
        let windows = build_windows(histories, &users, n_items, mode, window_size, config.seed)?;
        let window_ranges = Self::row_ranges(&windows);
        let consumed = users
            .iter()
            .map(|&u| histories.consumed(u).to_vec())
            .collect();

        let k = config.embed_size;
        let init = Initializer::GlorotUniform;
        let mut rng = seeded_rng(config.seed);
        let item_interaction = EmbeddingTable::new("item_interaction", n_items, k, init, &mut rng);
        let sparse = if sizes.has_sparse {
            let table = EmbeddingTable::new("sparse", sizes.sparse_feature_size, k, init, &mut rng);
            Some(SparseEmbedding::new(table, catalog.layout(), sizes.combiner)?)
        } else {
            None
        };
        let dense = sizes
            .has_dense
            .then(|| DenseFieldEmbedding::new(sizes.dense_field_size, k, init, &mut rng));
        let softmax_weights = init.initialize(&[n_items, k], &mut rng);
        let softmax_biases = Initializer::Zeros.initialize(&[n_items], &mut rng);

        let mut input_dim = k;
        if let Some(sparse) = &sparse {
            input_dim += sparse.num_fields() * k;
        }
        if let Some(dense) = &dense {
            input_dim += dense.num_fields() * k;
        }
        let mut tower_config = MLPConfig::new(input_dim)
            .with_batch_norm(config.use_bn)
            .with_dropout(config.dropout());
        for units in config.tower_units()? {
            tower_config = tower_config.add_layer(units, ActivationType::Elu);
        }
        let tower = tower_config.build(config.seed)?;

        let model = Self {
            config,
            sizes,
            n_users,
            n_items,
            windows,
            window_ranges,
            consumed,
            item_interaction,
            sparse,
            dense,
            tower,
            softmax_weights,
            softmax_biases,
            embeddings: None,
        };
        tracing::info!(
            model = "YouTubeRetrieval",
            n_users,
            n_items,
            tower_input = input_dim,
            window_mode = %mode,
            window_size,
            window_entries = model.windows.nnz(),
            params = model.num_params(),
            "built model"
        );
        Ok(model)
    }

    /// Entry range of every row; `build_windows` emits rows in ascending order.
    fn row_ranges(windows: &SparseIncidence) -> Vec<Range<usize>> {
        let mut ranges = vec![0..0; windows.num_rows()];
        let mut start = 0;
        while start < windows.indices.len() {
            let row = windows.indices[start][0];
            let mut end = start + 1;
            while end < windows.indices.len() && windows.indices[end][0] == row {
                end += 1;
            }
            ranges[row] = start..end;
            start = end;
        }
        ranges
    }

    /// The configuration the model was built with.
    pub fn config(&self) -> &YouTubeRetrievalConfig {
        &self.config
    }

    /// Field sizes resolved from the catalog.
    pub fn sizes(&self) -> &FieldSizes {
        &self.sizes
    }

    /// Interaction windows of all users, row `u` belonging to user `u`.
    pub fn windows(&self) -> &SparseIncidence {
        &self.windows
    }

    /// The user tower.
    pub fn tower(&self) -> &MLP {
        &self.tower
    }

    /// Total number of learnable scalars.
    pub fn num_params(&self) -> usize {
        self.item_interaction.weights().numel()
            + self.sparse.as_ref().map_or(0, |s| s.table().weights().numel())
            + self.dense.as_ref().map_or(0, |d| d.num_params())
            + self.tower.num_params()
            + self.softmax_weights.numel()
            + self.softmax_biases.numel()
    }

    fn check_user(&self, user: UserId) -> ModelResult<()> {
        if user >= self.n_users {
            return Err(ModelError::IndexOutOfRange {
                what: "user".to_string(),
                index: user,
                size: self.n_users,
            });
        }
        Ok(())
    }

    /// Windows of `users`, row `r` holding the window of `users[r]`.
    fn batch_windows(&self, users: &[UserId]) -> ModelResult<SparseIncidence> {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (row, &user) in users.iter().enumerate() {
            self.check_user(user)?;
            let range = self.window_ranges[user].clone();
            indices.extend(range.clone().map(|_| [row, 0]));
            values.extend_from_slice(&self.windows.values[range]);
        }
        Ok(SparseIncidence {
            indices,
            values,
            dense_shape: [users.len(), self.n_items],
        })
    }

    /// `[pooled window | sparse fields | dense fields]` for every user of `batch`.
    pub fn tower_input(&self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        batch.check(&self.sizes, false)?;
        let windows = self.batch_windows(&batch.users)?;
        let mut parts = vec![lookup_sparse(
            &self.item_interaction,
            &windows,
            Combiner::SqrtN,
        )?];
        if let (Some(sparse), Some(indices)) = (&self.sparse, &batch.sparse) {
            parts.push(concat_fields(&sparse.embed(indices)?)?);
        }
        if let (Some(dense), Some(values)) = (&self.dense, &batch.dense) {
            parts.push(concat_fields(&dense.embed(values)?)?);
        }
        let refs: Vec<&Tensor> = parts.iter().collect();
        Ok(concat_axis1(&refs)?)
    }

    /// User vectors `[batch, K]` in inference mode.
    pub fn user_vectors(&self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let input = self.tower_input(batch)?;
        Ok(self.tower.forward(&input)?)
    }

    /// User vectors in training mode: batch statistics and dropout apply.
    pub fn forward_train(&mut self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let input = self.tower_input(batch)?;
        Ok(self.tower.forward_train(&input)?)
    }

    /// Softmax logits `[batch, n_items]` over every item.
    pub fn logits(&self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let users = self.user_vectors(batch)?;
        let logits = users.matmul(&self.softmax_weights.transpose());
        Ok(logits.add(&self.softmax_biases))
    }

    /// Materializes the user and item matrices used by [`recommend_user`](Self::recommend_user).
    ///
    /// Feature rows are indexed by user id and must cover every user.
    pub fn set_embeddings(
        &mut self,
        user_sparse: Option<IndexBatch>,
        user_dense: Option<DenseBatch>,
    ) -> ModelResult<()> {
        let batch = FeatureBatch {
            users: (0..self.n_users).collect(),
            items: Vec::new(),
            sparse: user_sparse,
            dense: user_dense,
        };
        let user_vectors = self.user_vectors(&batch)?;
        let users = concat_axis1(&[&user_vectors, &Tensor::ones(&[self.n_users, 1])])?;
        let biases = self.softmax_biases.reshape(&[self.n_items, 1]);
        let items = concat_axis1(&[&self.softmax_weights, &biases])?;

        tracing::info!(
            users = users.shape()[0],
            items = items.shape()[0],
            dim = users.shape()[1],
            "set user and item embeddings"
        );
        self.embeddings = Some(Embeddings { users, items });
        Ok(())
    }

    /// User matrix `[n_users, K + 1]`, once set.
    pub fn user_embeddings(&self) -> Option<&Tensor> {
        self.embeddings.as_ref().map(|e| &e.users)
    }

    /// Item matrix `[n_items, K + 1]`, once set.
    pub fn item_embeddings(&self) -> Option<&Tensor> {
        self.embeddings.as_ref().map(|e| &e.items)
    }

    /// Top `n` items for `user` by dot product, best first.
    ///
    /// With `filter_consumed` set, items in the user's history are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmbeddingsNotSet`] before
    /// [`set_embeddings`](Self::set_embeddings) and
    /// [`ModelError::IndexOutOfRange`] for an unknown user.
    pub fn recommend_user(
        &self,
        user: UserId,
        n: usize,
        filter_consumed: bool,
    ) -> ModelResult<Vec<(ItemId, f32)>> {
        let embeddings = self.embeddings.as_ref().ok_or(ModelError::EmbeddingsNotSet)?;
        self.check_user(user)?;

        let user_vector = embeddings.users.row(user);
        let scores: Vec<f32> = (0..self.n_items)
            .map(|item| {
                embeddings
                    .items
                    .row(item)
                    .iter()
                    .zip(user_vector)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect();

        let exclude: HashSet<ItemId> = if filter_consumed {
            self.consumed[user].iter().copied().collect()
        } else {
            HashSet::new()
        };
        let ranked = top_n(&scores, &exclude, n);
        tracing::debug!(user, n, returned = ranked.len(), "recommended items");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Task;
    use libreco_core::{DenseField, FeatureOwner, SparseField, Vocabulary};

    fn catalog() -> FeatureCatalog {
        FeatureCatalog::new(3, 20)
            .with_sparse_field(SparseField::multi(
                "genres",
                FeatureOwner::User,
                Vocabulary::from_values(["a", "b", "c"]),
                2,
            ))
            .with_dense_field(DenseField::new("age", FeatureOwner::User))
    }

    fn histories() -> Vec<Vec<ItemId>> {
        vec![(0..15).collect(), vec![], vec![19, 3]]
    }

    fn config() -> YouTubeRetrievalConfig {
        YouTubeRetrievalConfig::default()
            .with_embed_size(4)
            .with_hidden_units("8")
    }

    fn user_features(catalog: &FeatureCatalog) -> (IndexBatch, DenseBatch) {
        let rows = vec![
            catalog.encode_sparse_row(&[vec!["a", "b"]]).unwrap(),
            catalog.encode_sparse_row(&[Vec::<&str>::new()]).unwrap(),
            catalog.encode_sparse_row(&[vec!["c"]]).unwrap(),
        ];
        (
            IndexBatch::from_rows(&rows).unwrap(),
            DenseBatch::new(vec![0.1, 0.5, 0.9], 1).unwrap(),
        )
    }

    fn model() -> YouTubeRetrieval {
        YouTubeRetrieval::new(&catalog(), &histories(), config()).unwrap()
    }

    #[test]
    fn test_rejects_item_features_and_rating() {
        let with_items = catalog().with_dense_field(DenseField::new("price", FeatureOwner::Item));
        assert!(matches!(
            YouTubeRetrieval::new(&with_items, &histories(), config()),
            Err(ModelError::ConfigError { .. })
        ));

        let rating = YouTubeRetrievalConfig {
            task: Task::Rating,
            ..config()
        };
        assert!(matches!(
            YouTubeRetrieval::new(&catalog(), &histories(), rating),
            Err(ModelError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_windows_cover_every_user() {
        let model = model();
        let windows = model.windows();
        assert_eq!(windows.dense_shape, [3, 20]);
        assert_eq!(windows.row_values(0), (5..15).collect::<Vec<_>>());
        assert!(windows.row_values(1).is_empty());
        assert_eq!(windows.row_values(2), vec![19, 3]);
        assert_eq!(model.window_ranges, vec![0..10, 10..10, 10..12]);
    }

    #[test]
    fn test_tower_input_layout() {
        let catalog = catalog();
        let model = model();
        let (sparse, dense) = user_features(&catalog);
        let batch = FeatureBatch::new(vec![1, 0, 2], Vec::new())
            .with_sparse(sparse.select_rows(&[1, 0, 2]).unwrap())
            .with_dense(dense.select_rows(&[1, 0, 2]).unwrap());

        let input = model.tower_input(&batch).unwrap();
        // pooled window, one pooled genre field, one dense field
        assert_eq!(input.shape(), &[3, 12]);
        // user 1 has no history and no genres
        assert!(input.row(0)[..8].iter().all(|&x| x == 0.0));

        let vectors = model.user_vectors(&batch).unwrap();
        assert_eq!(vectors.shape(), &[3, 4]);
        assert_eq!(model.logits(&batch).unwrap().shape(), &[3, 20]);
    }

    #[test]
    fn test_unknown_user_and_missing_features() {
        let catalog = catalog();
        let model = model();
        let (sparse, dense) = user_features(&catalog);
        let unknown = FeatureBatch::new(vec![0, 0, 3], Vec::new())
            .with_sparse(sparse.clone())
            .with_dense(dense);
        assert!(matches!(
            model.user_vectors(&unknown),
            Err(ModelError::IndexOutOfRange { .. })
        ));

        let missing = FeatureBatch::new(vec![0, 1, 2], Vec::new()).with_sparse(sparse);
        assert!(matches!(
            model.user_vectors(&missing),
            Err(ModelError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_history_items_past_catalog_are_rejected() {
        let catalog = FeatureCatalog::new(2, 5);
        let histories: Vec<Vec<ItemId>> = vec![vec![1, 7], vec![2]];
        let mut model = YouTubeRetrieval::new(&catalog, &histories, config()).unwrap();
        assert_eq!(model.windows().row_values(0), vec![1, 7]);

        let batch = FeatureBatch::new(vec![1, 0], Vec::new());
        assert!(matches!(
            model.tower_input(&batch),
            Err(ModelError::IndexOutOfRange { index: 7, size: 5, .. })
        ));
        assert!(model.tower_input(&FeatureBatch::new(vec![1], Vec::new())).is_ok());
        assert!(matches!(
            model.set_embeddings(None, None),
            Err(ModelError::IndexOutOfRange { index: 7, .. })
        ));
        assert!(model.user_embeddings().is_none());
    }

    #[test]
    fn test_recommend_requires_embeddings() {
        let model = model();
        assert!(matches!(
            model.recommend_user(0, 5, true),
            Err(ModelError::EmbeddingsNotSet)
        ));
    }

    #[test]
    fn test_set_embeddings_and_recommend() {
        let catalog = catalog();
        let mut model = model();
        let (sparse, dense) = user_features(&catalog);
        model.set_embeddings(Some(sparse), Some(dense)).unwrap();

        let users = model.user_embeddings().unwrap();
        let items = model.item_embeddings().unwrap();
        assert_eq!(users.shape(), &[3, 5]);
        assert_eq!(items.shape(), &[20, 5]);
        assert!((0..3).all(|u| users.row(u)[4] == 1.0));
        assert!((0..20).all(|i| items.row(i)[4] == 0.0));

        let recs = model.recommend_user(0, 10, true).unwrap();
        assert_eq!(recs.len(), 5);
        assert!(recs.iter().all(|(item, _)| *item >= 15));
        assert!(recs.windows(2).all(|w| w[0].1 >= w[1].1));

        let all = model.recommend_user(2, 100, false).unwrap();
        assert_eq!(all.len(), 20);
        assert!(matches!(
            model.recommend_user(3, 1, false),
            Err(ModelError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_recommend_scores_match_logits() {
        let catalog = catalog();
        let mut model = model();
        let (sparse, dense) = user_features(&catalog);
        let batch = FeatureBatch::new(vec![2], Vec::new())
            .with_sparse(sparse.select_rows(&[2]).unwrap())
            .with_dense(dense.select_rows(&[2]).unwrap());
        let logits = model.logits(&batch).unwrap();
        model.set_embeddings(Some(sparse), Some(dense)).unwrap();

        for (item, score) in model.recommend_user(2, 20, false).unwrap() {
            assert!((score - logits.row(0)[item]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_forward_train_matches_inference_shape() {
        let catalog = catalog();
        let mut model = YouTubeRetrieval::new(&catalog, &histories(), config().with_dropout(0.2))
            .unwrap();
        let (sparse, dense) = user_features(&catalog);
        let batch = FeatureBatch::new(vec![0, 1, 2], Vec::new())
            .with_sparse(sparse)
            .with_dense(dense);
        let train = model.forward_train(&batch).unwrap();
        assert_eq!(train.shape(), &[3, 4]);
        assert!(train.data().iter().all(|x| x.is_finite()));
    }
}
