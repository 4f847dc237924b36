//! Raw agency tables with arbitrary columns.
//!
//! `routes.csv` and `stops.csv` are kept as-is (apart from list parsing) so
//! they can be persisted back out next to the derived tables.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::parser::{parse_list_literal, render_list_literal};

/// One cell of a raw table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    List(Vec<String>),
}

impl Cell {
    /// Text content, trimmed. `None` for list cells and blank text.
    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            Cell::List(_) => None,
        }
    }

    pub fn list(&self) -> &[String] {
        match self {
            Cell::List(items) => items.as_slice(),
            Cell::Text(_) => &[],
        }
    }

    /// Flat string form used for CSV and database output.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::List(items) => render_list_literal(items),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    index: HashMap<String, usize>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        // Duplicate headers resolve to their first column.
        let mut index = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            index.entry(h.clone()).or_insert(i);
        }
        Self {
            headers,
            rows,
            index,
        }
    }

    /// Reads a headered CSV file. Short rows are padded with empty cells.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("malformed row in {}", path.display()))?;
            let mut row: Vec<Cell> = record
                .iter()
                .take(width)
                .map(|v| Cell::Text(v.to_string()))
                .collect();
            row.resize(width, Cell::Text(String::new()));
            rows.push(row);
        }

        debug!(columns = width, rows = rows.len(), "Loaded raw table");
        Ok(Self::new(headers, rows))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of `row` under column `name`, if the column exists.
    pub fn cell<'a>(&'a self, row: &'a [Cell], name: &str) -> Option<&'a Cell> {
        self.index.get(name).and_then(|&i| row.get(i))
    }

    /// Trimmed, non-blank text of `row` under column `name`.
    pub fn text<'a>(&'a self, row: &'a [Cell], name: &str) -> Option<&'a str> {
        self.cell(row, name).and_then(Cell::text)
    }

    /// List items of `row` under column `name`; empty when the column is absent.
    pub fn list<'a>(&'a self, row: &'a [Cell], name: &str) -> &'a [String] {
        self.cell(row, name).map(Cell::list).unwrap_or(&[])
    }

    /// Converts every cell of column `name` into a list. No-op if the column is missing.
    pub fn parse_list_column(&mut self, name: &str) {
        let Some(&i) = self.index.get(name) else {
            return;
        };
        for row in &mut self.rows {
            if let Some(Cell::Text(raw)) = row.get(i) {
                let items = parse_list_literal(raw);
                row[i] = Cell::List(items);
            }
        }
    }

    /// Maps the trimmed `key` column to the trimmed `value` column. Later rows win.
    pub fn lookup(&self, key: &str, value: &str) -> HashMap<String, String> {
        if !self.has_column(key) || !self.has_column(value) {
            return HashMap::new();
        }
        self.rows
            .iter()
            .filter_map(|row| {
                let k = self.text(row, key)?;
                let v = self.text(row, value)?;
                Some((k.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Rows rendered as flat strings, in header order.
    pub fn rendered_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::render).collect())
    }

    /// Writes the table to `path`, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in self.rendered_rows() {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
