use libreco_core::{
    resolve, Combiner, FeatureCatalog, FeatureOwner, IndexBatch, SparseField, Vocabulary,
};
use libreco_layers::prelude::*;

fn catalog() -> FeatureCatalog {
    FeatureCatalog::new(3, 3)
        .with_sparse_field(SparseField::multi(
            "genres",
            FeatureOwner::User,
            Vocabulary::from_values(["a", "b", "c", "d"]),
            3,
        ))
        .with_sparse_field(SparseField::multi(
            "tags",
            FeatureOwner::User,
            Vocabulary::from_values(["x", "y"]),
            4,
        ))
        .with_sparse_field(SparseField::single(
            "city",
            FeatureOwner::User,
            Vocabulary::from_values(["p", "q"]),
        ))
}

fn sparse_embedding(combiner: Combiner) -> SparseEmbedding {
    let catalog = catalog();
    let sizes = resolve(&catalog, combiner).unwrap();
    let table = EmbeddingTable::new(
        "sparse",
        sizes.sparse_feature_size,
        4,
        Initializer::GlorotUniform,
        &mut seeded_rng(42),
    );
    SparseEmbedding::new(table, catalog.layout(), sizes.combiner).unwrap()
}

#[test]
fn test_output_field_count_matches_resolved_sizes() {
    let catalog = catalog();
    let rows = vec![
        catalog
            .encode_sparse_row(&[vec!["a", "c"], vec!["y"], vec!["q"]])
            .unwrap(),
        catalog
            .encode_sparse_row(&[Vec::<&str>::new(), vec![], vec!["zzz"]])
            .unwrap(),
    ];
    let batch = IndexBatch::from_rows(&rows).unwrap();

    for combiner in [Combiner::Normal, Combiner::Sum, Combiner::Mean, Combiner::SqrtN] {
        let sizes = resolve(&catalog, combiner).unwrap();
        let out = sparse_embedding(combiner).embed(&batch).unwrap();
        assert_eq!(out.shape(), &[2, sizes.true_sparse_field_size, 4]);
    }
}

#[test]
fn test_empty_groups_pool_to_zero_and_oov_hits_last_row() {
    let catalog = catalog();
    let emb = sparse_embedding(Combiner::SqrtN);
    let row = catalog
        .encode_sparse_row(&[Vec::<&str>::new(), vec![], vec!["unseen"]])
        .unwrap();
    let batch = IndexBatch::from_rows(&[row]).unwrap();
    let out = emb.embed(&batch).unwrap();

    assert!(out.data()[..8].iter().all(|&x| x == 0.0));
    let city_oov = catalog.encode_sparse("city", "unseen").unwrap();
    assert_eq!(&out.data()[8..12], emb.table().row(city_oov).unwrap());
}

#[test]
fn test_padding_never_changes_pooled_vectors() {
    let catalog = catalog();
    let mut emb = sparse_embedding(Combiner::Mean);
    let row = catalog
        .encode_sparse_row(&[vec!["b"], vec!["x", "y"], vec!["p"]])
        .unwrap();
    let batch = IndexBatch::from_rows(&[row]).unwrap();
    let before = emb.embed(&batch).unwrap();

    // An optimizer step that touches every row, padding included.
    let rows: Vec<usize> = (0..emb.table().num_rows()).collect();
    let deltas = Tensor::ones(&[rows.len(), 4]);
    emb.table_mut().apply_update(&rows, &deltas).unwrap();

    for &pad in emb.table().zero_rows() {
        assert!(emb.table().row(pad).unwrap().iter().all(|&x| x == 0.0));
    }
    let after = emb.embed(&batch).unwrap();
    for (a, b) in after.data().iter().zip(before.data()) {
        assert!((a - (b + 1.0)).abs() < 1e-5);
    }
}

#[test]
fn test_fm_term_over_pooled_fields() {
    let catalog = catalog();
    let emb = sparse_embedding(Combiner::Sum);
    let row = catalog
        .encode_sparse_row(&[vec!["a", "d"], vec!["x"], vec!["q"]])
        .unwrap();
    let batch = IndexBatch::from_rows(&[row]).unwrap();
    let fields = emb.embed(&batch).unwrap();
    let fm = pairwise_interaction(&fields).unwrap();

    let v = |f: usize, k: usize| fields.data()[f * 4 + k];
    for k in 0..4 {
        let expected = v(0, k) * v(1, k) + v(0, k) * v(2, k) + v(1, k) * v(2, k);
        assert!((fm.data()[k] - expected).abs() < 1e-5);
    }
}
