//! CSV backed tables for worker shards and the combined dataset.
//!
//! Records carry scraped keys, so the header is whatever keys have been seen so far.
//! Concatenating tables aligns columns by name and leaves cells of absent columns empty.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::record::TrademarkRecord;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
            cells.resize(headers.len(), String::new());
            rows.push(cells);
        }
        Ok(Self { headers, rows })
    }

    /// Reads the table, or returns an empty one if the file doesn't exist.
    pub fn read_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes to a temporary sibling and renames it over `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let tmp = tmp_sibling(path);
        {
            let mut writer = WriterBuilder::new().from_path(&tmp)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The cell in `column` of row `row`, if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    pub fn push_record(&mut self, record: &TrademarkRecord) {
        let row = self.align(record.iter());
        self.rows.push(row);
    }

    /// Appends all rows of `other` after the existing ones.
    pub fn extend(&mut self, other: Table) {
        for row in other.rows {
            let pairs = other
                .headers
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str));
            let aligned = self.align(pairs);
            self.rows.push(aligned);
        }
    }

    /// Widens the header with unseen keys and lays the pairs out in header order.
    fn align<'a>(&mut self, pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<String> {
        let pairs: Vec<(&str, &str)> = pairs.collect();
        for (key, _) in &pairs {
            if !self.headers.iter().any(|h| h == key) {
                self.headers.push(key.to_string());
            }
        }
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }

        let mut row = vec![String::new(); self.headers.len()];
        for (key, value) in pairs {
            if let Some(idx) = self.headers.iter().position(|h| h == key) {
                row[idx] = value.to_string();
            }
        }
        row
    }
}

/// Durably appends one record to a worker shard.
///
/// The first record creates the file with its keys as header. A record bringing new keys
/// rewrites the file with a widened header; otherwise the row is appended and flushed.
pub fn append_record(path: &Path, record: &TrademarkRecord) -> Result<()> {
    if !path.exists() {
        let mut table = Table::default();
        table.push_record(record);
        return table.write(path);
    }

    let headers: Vec<String> = {
        let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
        reader.headers()?.iter().map(str::to_string).collect()
    };

    if record.keys().all(|k| headers.iter().any(|h| h == k)) {
        let row: Vec<&str> = headers
            .iter()
            .map(|h| record.get(h).unwrap_or_default())
            .collect();
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(&row)?;
        writer.flush()?;
    } else {
        debug!(path = %path.display(), "Record brings new columns, rewriting shard");
        let mut table = Table::read(path)?;
        table.push_record(record);
        table.write(path)?;
    }
    Ok(())
}

/// Appends every existing shard, in the given order, after the rows already in `combined`.
/// Shards are deleted once the combined table is written. Returns the number of merged rows.
pub fn merge_outputs(combined: &Path, shards: &[PathBuf]) -> Result<usize> {
    let existing: Vec<&PathBuf> = shards.iter().filter(|p| p.exists()).collect();
    if existing.is_empty() {
        info!("No worker output to merge");
        return Ok(0);
    }

    let mut table = Table::read_or_default(combined)?;
    let before = table.len();
    for shard in &existing {
        table.extend(Table::read(shard)?);
    }
    table.write(combined)?;

    for shard in existing {
        fs::remove_file(shard)?;
    }

    let merged = table.len() - before;
    info!(path = %combined.display(), merged, total = table.len(), "Combined data saved");
    Ok(merged)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
