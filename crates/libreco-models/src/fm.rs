//! Factorization machine with a neural pairwise stage.
//!
//! Every example contributes a set of fields: the user, the item, each
//! logical sparse field and each dense field. The model sums a linear part
//! over one-dimensional field weights and a pairwise part over the
//! second-order FM term of the `K`-dimensional field vectors.

use std::collections::HashSet;

use libreco_core::{resolve, DenseBatch, FeatureCatalog, FieldSizes, IndexBatch, ItemId, UserId};
use libreco_layers::activation::{sigmoid, ActivationType};
use libreco_layers::prelude::*;

use crate::batch::FeatureBatch;
use crate::config::{FmConfig, Task};
use crate::error::{ModelError, ModelResult};
use crate::ranking::top_n;

/// Per-field tables of one width (1 for the linear part, `K` for the pairwise part).
#[derive(Debug, Clone)]
struct FieldTables {
    user: EmbeddingTable,
    item: EmbeddingTable,
    sparse: Option<SparseEmbedding>,
    dense: Option<DenseFieldEmbedding>,
}

impl FieldTables {
    fn new(
        prefix: &str,
        dim: usize,
        catalog: &FeatureCatalog,
        sizes: &FieldSizes,
        rng: &mut rand::rngs::StdRng,
    ) -> ModelResult<Self> {
        let init = Initializer::GlorotUniform;
        let user = EmbeddingTable::for_vocabulary(
            format!("{prefix}_user"),
            catalog.n_users(),
            dim,
            init,
            rng,
        );
        let item = EmbeddingTable::for_vocabulary(
            format!("{prefix}_item"),
            catalog.n_items(),
            dim,
            init,
            rng,
        );
        let sparse = if sizes.has_sparse {
            let table = EmbeddingTable::new(
                format!("{prefix}_sparse"),
                sizes.sparse_feature_size,
                dim,
                init,
                rng,
            );
            Some(SparseEmbedding::new(table, catalog.layout(), sizes.combiner)?)
        } else {
            None
        };
        let dense = sizes
            .has_dense
            .then(|| DenseFieldEmbedding::new(sizes.dense_field_size, dim, init, rng));
        Ok(Self {
            user,
            item,
            sparse,
            dense,
        })
    }

    /// `[batch, fields, dim]` in the order user, item, sparse, dense.
    fn embed(&self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let n = batch.len();
        let dim = self.user.dim();
        let user = self.user.lookup(&batch.users)?.reshape(&[n, 1, dim]);
        let item = self.item.lookup(&batch.items)?.reshape(&[n, 1, dim]);

        let mut parts = vec![user, item];
        if let (Some(sparse), Some(indices)) = (&self.sparse, &batch.sparse) {
            parts.push(sparse.embed(indices)?);
        }
        if let (Some(dense), Some(values)) = (&self.dense, &batch.dense) {
            parts.push(dense.embed(values)?);
        }
        let refs: Vec<&Tensor> = parts.iter().collect();
        Ok(concat_axis1(&refs)?)
    }

    fn num_params(&self) -> usize {
        let sparse = self.sparse.as_ref().map_or(0, |s| s.table().weights().numel());
        let dense = self.dense.as_ref().map_or(0, |d| d.num_params());
        self.user.weights().numel() + self.item.weights().numel() + sparse + dense
    }
}

/// Factorization machine over users, items and side features.
///
/// # Example
///
/// ```
/// use libreco_core::FeatureCatalog;
/// use libreco_models::batch::FeatureBatch;
/// use libreco_models::config::FmConfig;
/// use libreco_models::fm::FmModel;
///
/// let model = FmModel::new(&FeatureCatalog::new(3, 4), FmConfig::default()).unwrap();
/// let scores = model.predict(&FeatureBatch::new(vec![0, 2], vec![1, 3])).unwrap();
/// assert_eq!(scores.len(), 2);
/// assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
/// ```
#[derive(Debug, Clone)]
pub struct FmModel {
    config: FmConfig,
    sizes: FieldSizes,
    n_users: usize,
    n_items: usize,
    linear: FieldTables,
    embeds: FieldTables,
    linear_dense: Dense,
    batch_norm: Option<BatchNorm>,
    pairwise_dense: Dense,
}

impl FmModel {
    /// Builds the model for `catalog`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` or `catalog` is invalid.
    pub fn new(catalog: &FeatureCatalog, config: FmConfig) -> ModelResult<Self> {
        config.validate()?;
        let sizes = resolve(catalog, config.multi_sparse_combiner)?;

        let mut rng = seeded_rng(config.seed);
        let k = config.embed_size;
        let linear = FieldTables::new("linear", 1, catalog, &sizes, &mut rng)?;
        let embeds = FieldTables::new("embed", k, catalog, &sizes, &mut rng)?;
        let num_fields = Self::num_fields(&sizes);
        let linear_dense = Dense::new(num_fields, 1, &mut rng);
        let batch_norm = config.use_bn.then(|| BatchNorm::new(k));
        let pairwise_dense = Dense::new(k, 1, &mut rng);

        let model = Self {
            config,
            sizes,
            n_users: catalog.n_users(),
            n_items: catalog.n_items(),
            linear,
            embeds,
            linear_dense,
            batch_norm,
            pairwise_dense,
        };
        tracing::info!(
            model = "FM",
            task = ?model.config.task,
            fields = num_fields,
            embed_size = k,
            combiner = %model.sizes.combiner,
            params = model.num_params(),
            "built model"
        );
        Ok(model)
    }

    fn num_fields(sizes: &FieldSizes) -> usize {
        let sparse = if sizes.has_sparse {
            sizes.true_sparse_field_size
        } else {
            0
        };
        let dense = if sizes.has_dense {
            sizes.dense_field_size
        } else {
            0
        };
        2 + sparse + dense
    }

    /// The configuration the model was built with.
    pub fn config(&self) -> &FmConfig {
        &self.config
    }

    /// Field sizes resolved from the catalog.
    pub fn sizes(&self) -> &FieldSizes {
        &self.sizes
    }

    /// Batch normalization of the pairwise term, when enabled.
    pub fn batch_norm(&self) -> Option<&BatchNorm> {
        self.batch_norm.as_ref()
    }

    /// The `K`-dimensional sparse feature embedding, when the catalog has sparse fields.
    pub fn sparse_embedding(&self) -> Option<&SparseEmbedding> {
        self.embeds.sparse.as_ref()
    }

    /// Total number of learnable scalars.
    pub fn num_params(&self) -> usize {
        self.linear.num_params()
            + self.embeds.num_params()
            + self.linear_dense.num_params()
            + self.batch_norm.as_ref().map_or(0, |bn| bn.num_params())
            + self.pairwise_dense.num_params()
    }

    /// Linear fields `[batch, fields]` and pairwise fields `[batch, fields, K]`.
    fn fields(&self, batch: &FeatureBatch) -> ModelResult<(Tensor, Tensor)> {
        batch.check(&self.sizes, true)?;
        let linear = self.linear.embed(batch)?;
        let linear = linear.reshape(&linear.shape()[..2]);
        let pairwise = self.embeds.embed(batch)?;
        Ok((linear, pairwise))
    }

    fn output(&self, linear: &Tensor, fm_term: &Tensor) -> ModelResult<Tensor> {
        let linear_term = self.linear_dense.forward(linear)?;
        let pairwise_term = ActivationType::Elu.apply(&self.pairwise_dense.forward(fm_term)?);
        let logits = linear_term.add(&pairwise_term);
        let n = logits.shape()[0];
        Ok(logits.reshape(&[n]))
    }

    /// Inference forward pass, one logit per example.
    ///
    /// Batch normalization uses its running statistics.
    pub fn forward(&self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let (linear, pairwise) = self.fields(batch)?;
        let mut fm_term = pairwise_interaction(&pairwise)?;
        if let Some(bn) = &self.batch_norm {
            fm_term = bn.forward(&fm_term)?;
        }
        self.output(&linear, &fm_term)
    }

    /// Training forward pass: batch normalization uses and records batch statistics.
    pub fn forward_train(&mut self, batch: &FeatureBatch) -> ModelResult<Tensor> {
        let (linear, pairwise) = self.fields(batch)?;
        let mut fm_term = pairwise_interaction(&pairwise)?;
        if let Some(bn) = self.batch_norm.as_mut() {
            fm_term = bn.forward_train(&fm_term)?;
        }
        self.output(&linear, &fm_term)
    }

    /// Scores of every example: probabilities for ranking, ratings for rating.
    pub fn predict(&self, batch: &FeatureBatch) -> ModelResult<Vec<f32>> {
        let logits = self.forward(batch)?.into_data();
        let scores = match (self.config.task, self.config.lower_upper_bound) {
            (Task::Ranking, _) => logits.into_iter().map(sigmoid).collect(),
            (Task::Rating, Some((lower, upper))) => {
                logits.into_iter().map(|x| x.clamp(lower, upper)).collect()
            }
            (Task::Rating, None) => logits,
        };
        Ok(scores)
    }

    /// Top `n` items for `user` by predicted score, best first.
    ///
    /// Every item of the catalog is scored against `user`. `sparse` and
    /// `dense` carry one feature row per item, row `i` describing the pair
    /// `(user, i)`. Items in `exclude` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IndexOutOfRange`] for an unknown user and a
    /// shape or configuration error if the feature rows do not cover every
    /// item.
    pub fn recommend_user(
        &self,
        user: UserId,
        n: usize,
        sparse: Option<IndexBatch>,
        dense: Option<DenseBatch>,
        exclude: &[ItemId],
    ) -> ModelResult<Vec<(ItemId, f32)>> {
        if user >= self.n_users {
            return Err(ModelError::IndexOutOfRange {
                what: "user".to_string(),
                index: user,
                size: self.n_users,
            });
        }
        let batch = FeatureBatch {
            users: vec![user; self.n_items],
            items: (0..self.n_items).collect(),
            sparse,
            dense,
        };
        let scores = self.predict(&batch)?;
        let exclude: HashSet<ItemId> = exclude.iter().copied().collect();
        let ranked = top_n(&scores, &exclude, n);
        tracing::debug!(user, n, returned = ranked.len(), "recommended items");
        Ok(ranked)
    }
}
