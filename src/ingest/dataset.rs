//! In-memory row batches and the datasets assembled from them.

use serde::{Deserialize, Serialize};

/// One decoded CSV record.
pub type Record = Vec<String>;

/// Records read from one line range.
///
/// `header` is only set for the batch that consumed the header record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBatch {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Record>,
}

impl RowBatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The ordered rows of one file under a single header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub header: Vec<String>,
    pub rows: Vec<Record>,
}

impl Dataset {
    /// Merge batches that are already in line-range order.
    ///
    /// The header comes from the first batch that carries one; every other
    /// batch is taken under that header. Empty batches contribute nothing.
    pub fn from_ordered_batches(batches: impl IntoIterator<Item = RowBatch>) -> Self {
        let mut dataset = Dataset::default();
        let mut header_seen = false;

        for batch in batches {
            if let Some(header) = batch.header {
                if !header_seen {
                    dataset.header = header;
                    header_seen = true;
                }
            }
            if !batch.rows.is_empty() {
                dataset.rows.extend(batch.rows);
            }
        }

        dataset
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Field value of `row` under column `idx`, empty when the record is short.
    pub fn field<'a>(&self, row: &'a Record, idx: usize) -> &'a str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }
}
