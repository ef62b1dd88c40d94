//! End-to-end demo on synthetic data: builds a catalog with user and item
//! features, scores a batch with the factorization machine and retrieves
//! candidates with the YouTube two-tower model.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use libreco_core::{
    DenseBatch, DenseField, FeatureCatalog, FeatureOwner, IndexBatch, Interaction, SparseField,
    UserConsumed, Vocabulary,
};
use libreco_models::{FeatureBatch, FmConfig, FmModel, YouTubeRetrieval, YouTubeRetrievalConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GENDERS: [&str; 2] = ["F", "M"];
const GENRES: [&str; 5] = ["action", "comedy", "drama", "horror", "romance"];

#[derive(Parser, Debug)]
struct Args {
    /// Number of users.
    #[arg(long, default_value_t = 50)]
    users: usize,

    /// Number of items.
    #[arg(long, default_value_t = 200)]
    items: usize,

    /// Interactions per user.
    #[arg(long, default_value_t = 20)]
    interactions: usize,

    /// Recommendations to print for each shown user.
    #[arg(long, default_value_t = 5)]
    top_n: usize,

    /// Seed of the synthetic data.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Optional JSON file with the FM configuration.
    #[arg(long)]
    fm_config: Option<PathBuf>,

    /// Optional JSON file with the YouTube retrieval configuration.
    #[arg(long)]
    youtube_config: Option<PathBuf>,
}

/// Random gender, up to three genres and an age per user.
fn user_features(
    catalog: &FeatureCatalog,
    n_users: usize,
    rng: &mut StdRng,
) -> anyhow::Result<(IndexBatch, DenseBatch)> {
    let mut rows = Vec::with_capacity(n_users);
    let mut ages = Vec::with_capacity(n_users);
    for _ in 0..n_users {
        let gender = GENDERS[rng.gen_range(0..GENDERS.len())];
        let genres: Vec<&str> = (0..rng.gen_range(0..=3))
            .map(|_| GENRES[rng.gen_range(0..GENRES.len())])
            .collect();
        rows.push(catalog.encode_sparse_row(&[vec![gender], genres])?);
        ages.push(rng.gen_range(0.0..1.0));
    }
    Ok((IndexBatch::from_rows(&rows)?, DenseBatch::new(ages, 1)?))
}

fn user_catalog(n_users: usize, n_items: usize) -> FeatureCatalog {
    FeatureCatalog::new(n_users, n_items)
        .with_sparse_field(SparseField::single(
            "gender",
            FeatureOwner::User,
            Vocabulary::from_values(GENDERS),
        ))
        .with_sparse_field(SparseField::multi(
            "genres",
            FeatureOwner::User,
            Vocabulary::from_values(GENRES),
            3,
        ))
        .with_dense_field(DenseField::new("age", FeatureOwner::User))
}

fn run_fm(args: &Args, catalog: &FeatureCatalog, rng: &mut StdRng) -> anyhow::Result<()> {
    let config = match &args.fm_config {
        Some(path) => FmConfig::from_json_file(path)
            .with_context(|| format!("loading FM config from {}", path.display()))?,
        None => FmConfig::default(),
    };
    let mut model = FmModel::new(catalog, config)?;

    let batch_size = 8.min(args.users);
    let users: Vec<usize> = (0..batch_size).collect();
    let items: Vec<usize> = (0..batch_size)
        .map(|_| rng.gen_range(0..args.items))
        .collect();
    let (sparse, ages) = user_features(catalog, batch_size, rng)?;
    let mut dense = Vec::with_capacity(batch_size * 2);
    for &age in ages.values() {
        dense.extend([age, rng.gen_range(1.0..50.0)]);
    }
    let batch = FeatureBatch::new(users, items)
        .with_sparse(sparse)
        .with_dense(DenseBatch::new(dense, 2)?);

    model.forward_train(&batch)?;
    let scores = model.predict(&batch)?;
    for ((user, item), score) in batch.users.iter().zip(&batch.items).zip(&scores) {
        tracing::info!(user, item, score, "fm prediction");
    }

    // user 0 against every item, keeping its own features and a random price
    let user_row = batch.sparse.as_ref().map(|s| s.row(0).to_vec());
    let sparse = user_row
        .map(|row| IndexBatch::from_rows(&vec![row; args.items]))
        .transpose()?;
    let age = ages.values()[0];
    let mut dense = Vec::with_capacity(args.items * 2);
    for _ in 0..args.items {
        dense.extend([age, rng.gen_range(1.0..50.0)]);
    }
    let dense = DenseBatch::new(dense, 2)?;
    let recs = model.recommend_user(0, args.top_n, sparse, Some(dense), &[])?;
    let items: Vec<usize> = recs.iter().map(|(item, _)| *item).collect();
    tracing::info!(user = 0, ?items, "fm recommendations");
    Ok(())
}

fn run_youtube(args: &Args, catalog: &FeatureCatalog, rng: &mut StdRng) -> anyhow::Result<()> {
    let config = match &args.youtube_config {
        Some(path) => YouTubeRetrievalConfig::from_json_file(path)
            .with_context(|| format!("loading YouTube config from {}", path.display()))?,
        None => YouTubeRetrievalConfig::default(),
    };

    let mut log = Vec::with_capacity(args.users * args.interactions);
    for user in 0..args.users {
        for t in 0..args.interactions {
            let item = rng.gen_range(0..args.items);
            log.push(Interaction::new(user, item, t as i64));
        }
    }
    let histories = UserConsumed::from_interactions(args.users, args.items, &log)?;
    tracing::info!(interactions = histories.len(), "generated interaction log");

    let mut model = YouTubeRetrieval::new(catalog, &histories, config)?;
    let (sparse, dense) = user_features(catalog, args.users, rng)?;
    model.set_embeddings(Some(sparse), Some(dense))?;

    for user in 0..3.min(args.users) {
        let recs = model.recommend_user(user, args.top_n, true)?;
        let items: Vec<usize> = recs.iter().map(|(item, _)| *item).collect();
        tracing::info!(user, ?items, "youtube recommendations");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();
    anyhow::ensure!(args.users > 0 && args.items > 0, "need at least one user and one item");

    let mut rng = StdRng::seed_from_u64(args.seed);

    // FM may use item features; YouTube retrieval only takes user features.
    let fm_catalog = user_catalog(args.users, args.items)
        .with_dense_field(DenseField::new("price", FeatureOwner::Item));
    run_fm(&args, &fm_catalog, &mut rng)?;

    let youtube_catalog = user_catalog(args.users, args.items);
    run_youtube(&args, &youtube_catalog, &mut rng)?;

    tracing::info!("demo finished");
    Ok(())
}
