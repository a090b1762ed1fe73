//! Decoding of JSON-stat 2.0 responses into long-format `DataFrame`s.
//!
//! A JSON-stat dataset is a flattened hypercube: `id` lists the dimensions, `size` their
//! cardinalities, and `value` holds one cell per combination in row-major order, either as a
//! dense array or as a sparse object keyed by the flat index (Eurostat uses the sparse form).
//! Cells absent from a sparse response decode as nulls, never as zeros.

use std::collections::HashMap;

use polars::prelude::*;
use serde::Deserialize;

use crate::error::EurolensError;
use crate::COL;

#[derive(Deserialize, Debug)]
pub struct Dataset {
    #[serde(default)]
    pub label: Option<String>,
    pub id: Vec<String>,
    pub size: Vec<usize>,
    pub dimension: HashMap<String, Dimension>,
    pub value: Values,
}

#[derive(Deserialize, Debug)]
pub struct Dimension {
    #[serde(default)]
    pub label: Option<String>,
    pub category: Category,
}

#[derive(Deserialize, Debug)]
pub struct Category {
    #[serde(default)]
    pub index: Option<CategoryIndex>,
    #[serde(default)]
    pub label: Option<HashMap<String, String>>,
}

/// JSON-stat allows the category index to be an object mapping code to position, or an
/// already-ordered array of codes.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum CategoryIndex {
    Positions(HashMap<String, usize>),
    Ordered(Vec<String>),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Values {
    Dense(Vec<Option<f64>>),
    Sparse(HashMap<String, Option<f64>>),
}

impl Category {
    /// Category codes in index order. A single-category dimension may omit the index entirely,
    /// in which case the label map supplies the lone code.
    fn ordered_codes(&self, size: usize) -> Result<Vec<String>, EurolensError> {
        match &self.index {
            Some(CategoryIndex::Ordered(codes)) => Ok(codes.clone()),
            Some(CategoryIndex::Positions(positions)) => {
                let mut codes = vec![String::new(); size];
                for (code, position) in positions {
                    let slot = codes.get_mut(*position).ok_or_else(|| {
                        EurolensError::MalformedJsonStat(format!(
                            "category '{code}' has index {position}, beyond dimension size {size}"
                        ))
                    })?;
                    *slot = code.clone();
                }
                Ok(codes)
            }
            None => {
                let codes: Vec<String> = self
                    .label
                    .as_ref()
                    .map(|labels| labels.keys().cloned().collect())
                    .unwrap_or_default();
                if codes.len() == size {
                    Ok(codes)
                } else {
                    Err(EurolensError::MalformedJsonStat(
                        "dimension category has neither an index nor a usable label map".into(),
                    ))
                }
            }
        }
    }

    /// Human-readable label for a code, falling back to the code itself.
    fn display_label(&self, code: &str) -> String {
        self.label
            .as_ref()
            .and_then(|labels| labels.get(code))
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Dataset {
    pub fn from_json_str(body: &str) -> Result<Self, EurolensError> {
        let dataset: Dataset = serde_json::from_str(body)?;
        if dataset.id.len() != dataset.size.len() {
            return Err(EurolensError::MalformedJsonStat(format!(
                "'id' lists {} dimensions but 'size' lists {}",
                dataset.id.len(),
                dataset.size.len()
            )));
        }
        Ok(dataset)
    }

    fn value_at(&self, index: usize) -> Option<f64> {
        match &self.value {
            Values::Dense(values) => values.get(index).copied().flatten(),
            Values::Sparse(values) => values.get(&index.to_string()).copied().flatten(),
        }
    }

    /// Expands the hypercube into a long `DataFrame`: one string column per dimension plus a
    /// nullable `value` column, one row per cell of the cartesian product.
    ///
    /// Dimension columns are named by the dimension label (falling back to the id). Values are
    /// the category labels, except for the dimensions listed in `code_valued_dims`, which emit
    /// the category codes instead (geo is keyed by its ISO-style code downstream).
    pub fn to_long_frame(&self, code_valued_dims: &[&str]) -> Result<DataFrame, EurolensError> {
        let n_dims = self.id.len();
        let n_rows: usize = self.size.iter().product();

        // Row-major strides: the last dimension varies fastest.
        let mut strides = vec![1usize; n_dims];
        for d in (0..n_dims.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * self.size[d + 1];
        }

        let mut columns: Vec<Series> = Vec::with_capacity(n_dims + 1);
        for (d, dim_id) in self.id.iter().enumerate() {
            let dimension = self.dimension.get(dim_id).ok_or_else(|| {
                EurolensError::MalformedJsonStat(format!(
                    "dimension '{dim_id}' is listed in 'id' but absent from 'dimension'"
                ))
            })?;
            let codes = dimension.category.ordered_codes(self.size[d])?;
            let use_codes = code_valued_dims.contains(&dim_id.as_str());
            let cell_values: Vec<String> = codes
                .iter()
                .map(|code| {
                    if use_codes {
                        code.clone()
                    } else {
                        dimension.category.display_label(code)
                    }
                })
                .collect();

            let mut column = Vec::with_capacity(n_rows);
            for row in 0..n_rows {
                column.push(cell_values[(row / strides[d]) % self.size[d]].clone());
            }
            let name = dimension
                .label
                .clone()
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| dim_id.clone());
            columns.push(Series::new(&name, column));
        }

        let values: Vec<Option<f64>> = (0..n_rows).map(|row| self.value_at(row)).collect();
        columns.push(Series::new(COL::VALUE, values));
        Ok(DataFrame::new(columns)?)
    }
}
