//! Plain-text tables for the terminal report and the input file inventory.

use crate::error::IngestError;
use crate::ingest::RecordSource;
use colored::Colorize;
use std::fmt;
use std::path::PathBuf;

/// Column-aligned text table with a bold title line.
#[derive(Debug, Clone, Default)]
pub struct Table {
    title: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a row. Missing cells render empty; extra cells are dropped.
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    format!("{}{}", cell, " ".repeat(fill))
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| pad(cell, w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        writeln!(f, "{}", self.title.bold())?;
        writeln!(f, "{}", line(&self.columns))?;
        let rule: usize = widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1);
        write!(f, "{}", "-".repeat(rule))?;
        for row in &self.rows {
            write!(f, "\n{}", line(row))?;
        }
        Ok(())
    }
}

/// `1234567` as `1,234,567`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Record count (header included) and size of every file.
pub fn file_inventory(source: &dyn RecordSource, files: &[PathBuf]) -> Result<Table, IngestError> {
    const MIB: f64 = 1024.0 * 1024.0;

    let mut table = Table::new("Input files").columns(["File", "Records", "Size (MB)"]);
    for path in files {
        let records = source.count_records(path)?;
        let bytes = std::fs::metadata(path)
            .map_err(|e| IngestError::PreScan {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .len();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        table.add_row([name, group_digits(records), format!("{:.2}", bytes as f64 / MIB)]);
    }
    Ok(table)
}
