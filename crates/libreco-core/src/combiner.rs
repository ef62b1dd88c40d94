//! Combiner modes for multi-valued sparse fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecoError;

/// How the indices of one multi-valued sparse field are reduced to a single
/// embedding vector.
///
/// `Normal` disables pooling: every raw slot of a multi-valued field is treated
/// as an independent field. The other modes only affect multi-valued fields,
/// single-valued fields always use a direct row lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Combiner {
    /// No pooling, one output field per raw slot.
    Normal,
    /// Element-wise sum of the valid rows.
    Sum,
    /// Sum divided by the number of valid rows.
    Mean,
    /// Sum divided by the square root of the number of valid rows.
    #[default]
    SqrtN,
}

impl Combiner {
    /// Returns true if this mode collapses a multi-valued group into one vector.
    pub fn pools(&self) -> bool {
        !matches!(self, Combiner::Normal)
    }

    /// Divisor applied to the pooled sum of `count` valid rows.
    ///
    /// Returns `None` for an empty group under `mean` / `sqrtn`, in which case
    /// the pooled vector is the zero vector.
    pub fn divisor(&self, count: usize) -> Option<f32> {
        match self {
            Combiner::Normal | Combiner::Sum => Some(1.0),
            Combiner::Mean if count == 0 => None,
            Combiner::Mean => Some(count as f32),
            Combiner::SqrtN if count == 0 => None,
            Combiner::SqrtN => Some((count as f32).sqrt()),
        }
    }

    /// The name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Combiner::Normal => "normal",
            Combiner::Sum => "sum",
            Combiner::Mean => "mean",
            Combiner::SqrtN => "sqrtn",
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Combiner {
    type Err = RecoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Combiner::Normal),
            "sum" => Ok(Combiner::Sum),
            "mean" => Ok(Combiner::Mean),
            "sqrtn" => Ok(Combiner::SqrtN),
            other => Err(RecoError::config(format!(
                "unsupported multi_sparse_combiner `{other}`, expected one of normal, sum, mean, sqrtn"
            ))),
        }
    }
}
