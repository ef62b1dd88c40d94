//! Feature catalog: the immutable description of a dataset's features.
//!
//! # Overview
//!
//! - [`Vocabulary`]: stable mapping from raw categorical values to indices, with
//!   the out-of-vocabulary (OOV) index equal to the vocabulary size.
//! - [`SparseField`]: a categorical field, single- or multi-valued.
//! - [`DenseField`]: a continuous field.
//! - [`FeatureCatalog`]: counts of users and items plus the field lists.
//! - [`SparseLayout`]: where each logical field lives in an index batch and in
//!   the shared sparse embedding table.
//!
//! All sparse fields share one embedding table. A field with a vocabulary of
//! `n` values owns `n + 1` consecutive rows of it, the last of which is the
//! field's OOV row. Multi-valued fields pad unused slots with that OOV index.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{RecoError, Result};

/// Which side of the interaction a feature describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureOwner {
    /// A user-side feature (age, gender, ...).
    #[default]
    User,
    /// An item-side feature (genre, price, ...).
    Item,
}

/// Ordered set of the distinct raw values of a categorical field.
///
/// # Examples
///
/// ```
/// use libreco_core::catalog::Vocabulary;
///
/// let vocab = Vocabulary::from_values(["F", "M", "F"]);
/// assert_eq!(vocab.len(), 2);
/// assert_eq!(vocab.encode("M"), 1);
/// assert_eq!(vocab.encode("unknown"), vocab.oov_index());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary, keeping the first occurrence of every value.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::default();
        for value in values {
            let value = value.into();
            if !vocab.index.contains_key(&value) {
                vocab.index.insert(value.clone(), vocab.values.len());
                vocab.values.push(value);
            }
        }
        vocab
    }

    /// Number of known values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value is known.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The reserved index for unseen values.
    pub fn oov_index(&self) -> usize {
        self.values.len()
    }

    /// Maps a raw value to its index, or to [`Self::oov_index`] if unseen.
    pub fn encode(&self, raw: &str) -> usize {
        self.index.get(raw).copied().unwrap_or(self.values.len())
    }

    /// Maps an index back to its raw value.
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(values: Vec<String>) -> Self {
        Self::from_values(values)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.values
    }
}

/// A categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseField {
    /// Field name, unique within the catalog.
    name: String,
    /// The side the field describes.
    #[serde(default)]
    owner: FeatureOwner,
    /// Known values of the field.
    vocabulary: Vocabulary,
    /// Number of raw slots the field occupies in an index batch.
    width: usize,
    /// Whether the field lists several values per example.
    multi: bool,
}

impl SparseField {
    /// Creates a single-valued field.
    pub fn single(name: impl Into<String>, owner: FeatureOwner, vocabulary: Vocabulary) -> Self {
        Self {
            name: name.into(),
            owner,
            vocabulary,
            width: 1,
            multi: false,
        }
    }

    /// Creates a multi-valued field holding at most `width` values per example.
    ///
    /// A width of zero is accepted here and rejected by [`FeatureCatalog::validate`].
    pub fn multi(
        name: impl Into<String>,
        owner: FeatureOwner,
        vocabulary: Vocabulary,
        width: usize,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            vocabulary,
            width,
            multi: true,
        }
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning side.
    #[inline]
    pub fn owner(&self) -> FeatureOwner {
        self.owner
    }

    /// Returns the vocabulary.
    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Returns the number of raw slots.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns whether the field is multi-valued.
    #[inline]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Rows this field owns in the shared sparse table (vocabulary plus OOV).
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

/// A continuous field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseField {
    name: String,
    #[serde(default)]
    owner: FeatureOwner,
}

impl DenseField {
    /// Creates a dense field.
    pub fn new(name: impl Into<String>, owner: FeatureOwner) -> Self {
        Self {
            name: name.into(),
            owner,
        }
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning side.
    #[inline]
    pub fn owner(&self) -> FeatureOwner {
        self.owner
    }
}

/// Placement of one logical sparse field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    /// Field name.
    pub name: String,
    /// First slot of the field in an index batch row.
    pub slot_offset: usize,
    /// Number of slots.
    pub width: usize,
    /// Whether the field is multi-valued.
    pub multi: bool,
    /// First row of the field in the shared sparse table.
    pub row_offset: usize,
    /// Global index of the field's OOV row, also used as padding.
    pub oov_index: usize,
}

/// Slot and row placement of every sparse field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SparseLayout {
    groups: Vec<FieldGroup>,
    num_slots: usize,
    num_rows: usize,
}

impl SparseLayout {
    /// The logical fields in declaration order.
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// Width of an index batch row.
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Rows of the shared sparse table.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// OOV rows of multi-valued fields, which double as padding and must stay zero.
    pub fn padding_rows(&self) -> Vec<usize> {
        self.groups
            .iter()
            .filter(|g| g.multi)
            .map(|g| g.oov_index)
            .collect()
    }
}

/// Offsets, widths and OOV indices of the multi-valued fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSparseInfo {
    /// First slot of every multi-valued field.
    pub field_offset: Vec<usize>,
    /// Width of every multi-valued field.
    pub field_len: Vec<usize>,
    /// Global OOV index of every multi-valued field.
    pub feat_oov: Vec<usize>,
}

/// Immutable metadata describing the features of a dataset.
///
/// # Examples
///
/// ```
/// use libreco_core::catalog::{FeatureCatalog, FeatureOwner, SparseField, Vocabulary};
///
/// let catalog = FeatureCatalog::new(100, 50)
///     .with_sparse_field(SparseField::single(
///         "gender",
///         FeatureOwner::User,
///         Vocabulary::from_values(["F", "M"]),
///     ))
///     .with_sparse_field(SparseField::multi(
///         "genres",
///         FeatureOwner::Item,
///         Vocabulary::from_values(["action", "comedy", "drama"]),
///         3,
///     ));
/// assert_eq!(catalog.sparse_field_size(), 4);
/// assert_eq!(catalog.sparse_feature_size(), 3 + 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    n_users: usize,
    n_items: usize,
    #[serde(default)]
    sparse_fields: Vec<SparseField>,
    #[serde(default)]
    dense_fields: Vec<DenseField>,
}

impl FeatureCatalog {
    /// Creates a catalog with only user and item ids.
    pub fn new(n_users: usize, n_items: usize) -> Self {
        Self {
            n_users,
            n_items,
            sparse_fields: Vec::new(),
            dense_fields: Vec::new(),
        }
    }

    /// Appends a sparse field.
    pub fn with_sparse_field(mut self, field: SparseField) -> Self {
        self.sparse_fields.push(field);
        self
    }

    /// Appends a dense field.
    pub fn with_dense_field(mut self, field: DenseField) -> Self {
        self.dense_fields.push(field);
        self
    }

    /// Number of known users. User index `n_users` is the user OOV index.
    pub fn n_users(&self) -> usize {
        self.n_users
    }

    /// Number of known items. Item index `n_items` is the item OOV index.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Sparse fields in declaration order.
    pub fn sparse_fields(&self) -> &[SparseField] {
        &self.sparse_fields
    }

    /// Dense fields in declaration order.
    pub fn dense_fields(&self) -> &[DenseField] {
        &self.dense_fields
    }

    /// Returns true if the catalog declares any sparse field.
    pub fn has_sparse(&self) -> bool {
        !self.sparse_fields.is_empty()
    }

    /// Returns true if the catalog declares any dense field.
    pub fn has_dense(&self) -> bool {
        !self.dense_fields.is_empty()
    }

    /// Returns true if at least one sparse field is multi-valued.
    pub fn has_multi_sparse(&self) -> bool {
        self.sparse_fields.iter().any(SparseField::is_multi)
    }

    /// Returns true if any feature is owned by the item side.
    pub fn has_item_features(&self) -> bool {
        self.sparse_fields
            .iter()
            .any(|f| f.owner() == FeatureOwner::Item)
            || self
                .dense_fields
                .iter()
                .any(|f| f.owner() == FeatureOwner::Item)
    }

    /// Number of raw sparse slots.
    pub fn sparse_field_size(&self) -> usize {
        self.sparse_fields.iter().map(SparseField::width).sum()
    }

    /// Number of rows of the shared sparse table.
    pub fn sparse_feature_size(&self) -> usize {
        self.sparse_fields.iter().map(SparseField::num_rows).sum()
    }

    /// Number of dense fields.
    pub fn dense_field_size(&self) -> usize {
        self.dense_fields.len()
    }

    /// Checks the internal consistency of the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RecoError::ConfigError`] when a field name is empty or
    /// duplicated, or a multi-valued field declares zero sub-fields.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let names = self
            .sparse_fields
            .iter()
            .map(SparseField::name)
            .chain(self.dense_fields.iter().map(DenseField::name));
        for name in names {
            if name.is_empty() {
                return Err(RecoError::config("feature field with an empty name"));
            }
            if !seen.insert(name) {
                return Err(RecoError::config(format!(
                    "feature field `{name}` is declared more than once"
                )));
            }
        }

        for field in &self.sparse_fields {
            if field.is_multi() && field.width() == 0 {
                return Err(RecoError::config(format!(
                    "multi-valued field `{}` declares zero sub-fields",
                    field.name()
                )));
            }
            if !field.is_multi() && field.width() != 1 {
                return Err(RecoError::config(format!(
                    "single-valued field `{}` must occupy exactly one slot, got {}",
                    field.name(),
                    field.width()
                )));
            }
        }
        Ok(())
    }

    /// Computes the slot and table placement of every sparse field.
    pub fn layout(&self) -> SparseLayout {
        let mut groups = Vec::with_capacity(self.sparse_fields.len());
        let mut slot_offset = 0;
        let mut row_offset = 0;
        for field in &self.sparse_fields {
            groups.push(FieldGroup {
                name: field.name().to_string(),
                slot_offset,
                width: field.width(),
                multi: field.is_multi(),
                row_offset,
                oov_index: row_offset + field.vocabulary().oov_index(),
            });
            slot_offset += field.width();
            row_offset += field.num_rows();
        }
        SparseLayout {
            groups,
            num_slots: slot_offset,
            num_rows: row_offset,
        }
    }

    /// Offsets, widths and OOV indices of the multi-valued fields, if any.
    pub fn multi_sparse_info(&self) -> Option<MultiSparseInfo> {
        let layout = self.layout();
        let multi: Vec<&FieldGroup> = layout.groups().iter().filter(|g| g.multi).collect();
        if multi.is_empty() {
            return None;
        }
        Some(MultiSparseInfo {
            field_offset: multi.iter().map(|g| g.slot_offset).collect(),
            field_len: multi.iter().map(|g| g.width).collect(),
            feat_oov: multi.iter().map(|g| g.oov_index).collect(),
        })
    }

    /// Maps a raw value of the named field to its global sparse-table index.
    pub fn encode_sparse(&self, field: &str, raw: &str) -> Result<usize> {
        let layout = self.layout();
        let (group, sparse) = layout
            .groups()
            .iter()
            .zip(&self.sparse_fields)
            .find(|(g, _)| g.name == field)
            .ok_or_else(|| RecoError::config(format!("unknown sparse field `{field}`")))?;
        Ok(group.row_offset + sparse.vocabulary().encode(raw))
    }

    /// Encodes one example's raw sparse values into an index batch row.
    ///
    /// `values` holds one list per sparse field. Single-valued fields use the
    /// first value (OOV when empty); multi-valued fields keep at most `width`
    /// values and pad the rest with the field's OOV index.
    pub fn encode_sparse_row<S: AsRef<str>>(&self, values: &[Vec<S>]) -> Result<Vec<usize>> {
        if values.len() != self.sparse_fields.len() {
            return Err(RecoError::ShapeMismatch {
                expected: vec![self.sparse_fields.len()],
                actual: vec![values.len()],
            });
        }
        let layout = self.layout();
        let mut row = Vec::with_capacity(layout.num_slots());
        for ((group, field), raw) in layout.groups().iter().zip(&self.sparse_fields).zip(values) {
            let encoded = raw
                .iter()
                .take(group.width)
                .map(|v| group.row_offset + field.vocabulary().encode(v.as_ref()));
            let start = row.len();
            row.extend(encoded);
            row.resize(start + group.width, group.oov_index);
        }
        Ok(row)
    }
}
