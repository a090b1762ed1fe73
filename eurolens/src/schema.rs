//! Declarative per-source column mappings.
//!
//! Column names returned by the Eurostat API are not stable across dataset releases: the same
//! dimension has surfaced as a human-readable label ("Frequency") or as a series code
//! ("frequenc"). Each canonical column therefore lists its candidates in preference order; the
//! first one present wins, and a required column with no match is a hard error naming the
//! source, the column and every candidate tried — never a silent fallback to an unrelated
//! column.

use polars::prelude::*;

use crate::error::EurolensError;

#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub canonical: &'static str,
    pub candidates: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub source_id: &'static str,
    pub columns: &'static [ColumnMapping],
}

impl SourceSchema {
    /// Renames upstream columns to the canonical vocabulary, keeping only mapped columns.
    pub fn normalize(&self, df: &DataFrame) -> Result<DataFrame, EurolensError> {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut selected: Vec<Series> = Vec::with_capacity(self.columns.len());
        for mapping in self.columns {
            let hit = mapping
                .candidates
                .iter()
                .find(|candidate| present.iter().any(|name| name == *candidate));
            let Some(hit) = hit else {
                return Err(EurolensError::SchemaMismatch {
                    source_id: self.source_id.to_string(),
                    column: mapping.canonical.to_string(),
                    candidates: mapping.candidates.iter().map(|c| c.to_string()).collect(),
                });
            };
            let mut series = df.column(hit)?.clone();
            series.rename(mapping.canonical);
            selected.push(series);
        }
        Ok(DataFrame::new(selected)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COL;

    const TEST_SCHEMA: SourceSchema = SourceSchema {
        source_id: "test",
        columns: &[
            ColumnMapping {
                canonical: COL::GEO,
                candidates: &["Geopolitical entity (reporting)", "geo"],
            },
            ColumnMapping {
                canonical: COL::VALUE,
                candidates: &["value"],
            },
        ],
    };

    #[test]
    fn first_candidate_wins() {
        let df = DataFrame::new(vec![
            Series::new("Geopolitical entity (reporting)", ["BE", "DE"]),
            Series::new("value", [1.0, 2.0]),
        ])
        .unwrap();
        let normalized = TEST_SCHEMA.normalize(&df).unwrap();
        assert_eq!(normalized.get_column_names(), &[COL::GEO, COL::VALUE]);
    }

    #[test]
    fn fallback_candidate_is_used_when_label_changes() {
        let df = DataFrame::new(vec![
            Series::new("geo", ["BE", "DE"]),
            Series::new("value", [1.0, 2.0]),
        ])
        .unwrap();
        let normalized = TEST_SCHEMA.normalize(&df).unwrap();
        assert_eq!(normalized.get_column_names(), &[COL::GEO, COL::VALUE]);
    }

    #[test]
    fn missing_required_column_is_a_descriptive_error() {
        let df = DataFrame::new(vec![Series::new("value", [1.0])]).unwrap();
        let err = TEST_SCHEMA.normalize(&df).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("test"));
        assert!(message.contains(COL::GEO));
        assert!(message.contains("Geopolitical entity (reporting)"));
    }

    #[test]
    fn unmapped_columns_are_dropped() {
        let df = DataFrame::new(vec![
            Series::new("geo", ["BE"]),
            Series::new("value", [1.0]),
            Series::new("unit", ["PPS"]),
        ])
        .unwrap();
        let normalized = TEST_SCHEMA.normalize(&df).unwrap();
        assert_eq!(normalized.get_column_names(), &[COL::GEO, COL::VALUE]);
    }
}
