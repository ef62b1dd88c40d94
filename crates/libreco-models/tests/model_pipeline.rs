use std::io::Write;

use libreco_core::{
    Combiner, DenseBatch, DenseField, FeatureCatalog, FeatureOwner, IndexBatch, Interaction,
    SparseField, UserConsumed, Vocabulary,
};
use libreco_models::{
    FeatureBatch, FmConfig, FmModel, ModelError, Task, YouTubeRetrieval, YouTubeRetrievalConfig,
};

fn fm_catalog() -> FeatureCatalog {
    FeatureCatalog::new(5, 8)
        .with_sparse_field(SparseField::single(
            "gender",
            FeatureOwner::User,
            Vocabulary::from_values(["F", "M"]),
        ))
        .with_sparse_field(SparseField::multi(
            "genres",
            FeatureOwner::Item,
            Vocabulary::from_values(["action", "comedy", "drama", "horror"]),
            3,
        ))
        .with_dense_field(DenseField::new("price", FeatureOwner::Item))
}

#[test]
fn test_fm_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"task": "rating", "embed_size": 6, "multi_sparse_combiner": "mean", "lower_upper_bound": [1.0, 5.0]}}"#
    )
    .unwrap();

    let config = FmConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.task, Task::Rating);
    assert!(config.use_bn);

    let catalog = fm_catalog();
    let model = FmModel::new(&catalog, config).unwrap();
    assert_eq!(model.sizes().combiner, Combiner::Mean);

    let rows = vec![
        catalog
            .encode_sparse_row(&[vec!["F"], vec!["action", "horror"]])
            .unwrap(),
        catalog
            .encode_sparse_row(&[vec!["X"], vec!["comedy", "drama", "horror"]])
            .unwrap(),
    ];
    let batch = FeatureBatch::new(vec![1, 4], vec![0, 7])
        .with_sparse(IndexBatch::from_rows(&rows).unwrap())
        .with_dense(DenseBatch::new(vec![9.99, 4.5], 1).unwrap());
    let ratings = model.predict(&batch).unwrap();
    assert_eq!(ratings.len(), 2);
    assert!(ratings.iter().all(|r| (1.0..=5.0).contains(r)));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = YouTubeRetrievalConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ModelError::Io { .. }));
}

#[test]
fn test_fm_padding_rows_stay_zero() {
    let model = FmModel::new(&fm_catalog(), FmConfig::default()).unwrap();
    let sparse = model.sparse_embedding().unwrap();
    assert!(!sparse.table().zero_rows().is_empty());
    for &row in sparse.table().zero_rows() {
        assert!(sparse.table().row(row).unwrap().iter().all(|&x| x == 0.0));
    }
}

#[test]
fn test_youtube_from_interaction_log() {
    let catalog = FeatureCatalog::new(3, 10).with_dense_field(DenseField::new("age", FeatureOwner::User));
    let log = vec![
        Interaction::new(0, 4, 30),
        Interaction::new(0, 2, 10),
        Interaction::new(0, 9, 20),
        Interaction::new(2, 1, 5),
    ];
    let histories = UserConsumed::from_interactions(3, 10, &log).unwrap();

    let config = YouTubeRetrievalConfig::default()
        .with_embed_size(4)
        .with_hidden_units("16,8")
        .with_recent(2);
    let mut model = YouTubeRetrieval::new(&catalog, &histories, config).unwrap();
    // chronological order, last two
    assert_eq!(model.windows().row_values(0), vec![9, 4]);
    assert!(model.windows().row_values(1).is_empty());

    let ages = DenseBatch::new(vec![0.3, 0.5, 0.1], 1).unwrap();
    model.set_embeddings(None, Some(ages)).unwrap();

    let recs = model.recommend_user(0, 10, true).unwrap();
    let ids: Vec<usize> = recs.iter().map(|(item, _)| *item).collect();
    assert_eq!(ids.len(), 7);
    assert!(!ids.contains(&2) && !ids.contains(&4) && !ids.contains(&9));

    // user 1 has no history: nothing filtered
    assert_eq!(model.recommend_user(1, 10, true).unwrap().len(), 10);
}

#[test]
fn test_youtube_random_windows_are_reproducible() {
    let catalog = FeatureCatalog::new(2, 50);
    let histories: Vec<Vec<usize>> = vec![(0..40).collect(), (10..20).collect()];
    let config = YouTubeRetrievalConfig::default()
        .with_hidden_units("8")
        .with_random(5)
        .with_seed(3);

    let a = YouTubeRetrieval::new(&catalog, &histories, config.clone()).unwrap();
    let b = YouTubeRetrieval::new(&catalog, &histories, config).unwrap();
    assert_eq!(a.windows(), b.windows());

    let window = a.windows().row_values(0);
    assert_eq!(window.len(), 5);
    assert!(window.windows(2).all(|w| w[0] < w[1]));
}
