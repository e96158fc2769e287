//! Historical participant score matrices
//!
//! One matrix per scale: rows are participants, columns are item numbers, values are
//! raw Likert answers with `None` for missing entries. Matrices are read-only after
//! loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::items::{LikertRange, Scale};
use crate::{Error, Result};

/// Historical matrices keyed by scale
pub type HistorySet = BTreeMap<Scale, HistoricalMatrix>;

/// A matrix column to score: its position and whether the item is reverse-coded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredColumn {
    pub position: usize,
    pub reverse_coded: bool,
}

/// Participant × item score matrix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatrix {
    /// Optional participant ids, one per row; used to pair rows across scales
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    /// Item number of each column
    pub columns: Vec<u32>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl HistoricalMatrix {
    /// Create a matrix, checking every row against the column count
    pub fn new(columns: Vec<u32>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let matrix = Self {
            participants: None,
            columns,
            rows,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn with_participants(mut self, participants: Vec<String>) -> Result<Self> {
        self.participants = Some(participants);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let width = self.columns.len();
        if let Some((i, row)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::InvalidInput(format!(
                "History row {} has {} values, expected {}",
                i,
                row.len(),
                width
            )));
        }
        if let Some(ids) = &self.participants {
            if ids.len() != self.rows.len() {
                return Err(Error::InvalidInput(format!(
                    "History has {} participant ids for {} rows",
                    ids.len(),
                    self.rows.len()
                )));
            }
        }
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column position of an item number, if the item was recorded
    pub fn position(&self, item_number: u32) -> Option<usize> {
        self.columns.iter().position(|&c| c == item_number)
    }

    pub fn has_item(&self, item_number: u32) -> bool {
        self.position(item_number).is_some()
    }

    /// Resolve `(item_number, reverse_coded)` pairs to scored columns, dropping
    /// items the matrix does not record
    pub fn scored_columns(&self, items: impl IntoIterator<Item = (u32, bool)>) -> Vec<ScoredColumn> {
        items
            .into_iter()
            .filter_map(|(n, reverse_coded)| {
                self.position(n).map(|position| ScoredColumn {
                    position,
                    reverse_coded,
                })
            })
            .collect()
    }

    /// Scored values of one row, or `None` if any requested column is missing
    fn scored_row(&self, row: &[Option<f64>], columns: &[ScoredColumn], likert: LikertRange) -> Option<Vec<f64>> {
        columns
            .iter()
            .map(|c| {
                row[c.position]
                    .filter(|v| v.is_finite())
                    .map(|v| likert.score(v, c.reverse_coded))
            })
            .collect()
    }

    /// Complete-case rows restricted to `columns`, reverse coding applied
    pub fn complete_rows(&self, columns: &[ScoredColumn], likert: LikertRange) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .filter_map(|row| self.scored_row(row, columns, likert))
            .collect()
    }

    /// Per-row mean over `columns`; rows with any missing value yield `None`
    pub fn row_means(&self, columns: &[ScoredColumn], likert: LikertRange) -> Vec<Option<f64>> {
        if columns.is_empty() {
            return vec![None; self.rows.len()];
        }
        self.rows
            .iter()
            .map(|row| {
                self.scored_row(row, columns, likert)
                    .map(|values| values.iter().sum::<f64>() / values.len() as f64)
            })
            .collect()
    }
}
