/// CSV loading and partition writing for the offline path
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SorterError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Characters not allowed in output file names
const ILLEGAL_FILE_NAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// A CSV table with every original column kept
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn new(headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        Self { headers, rows }
    }

    /// Build from string slices (handy for tests and small tables)
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: StringRecord::from(headers.to_vec()),
            rows: rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, if present
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Index of a column that must be present
    pub fn require(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| SorterError::DataShape(format!("missing required column '{}'", name)))
    }

    /// Cell value, empty for short rows
    pub fn cell<'r>(row: &'r StringRecord, index: usize) -> &'r str {
        row.get(index).unwrap_or("")
    }
}

/// Read a CSV file with a header row; a leading BOM is ignored
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(SorterError::Config(format!(
            "required CSV file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let content = content.trim_start_matches('\u{feff}');

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

    info!("📄 Read {} rows from {}", rows.len(), path.display());
    Ok(Table { headers, rows })
}

/// Read a metadata table; requires `video_id` and `title`
pub fn read_metadata(path: &Path) -> Result<Table> {
    let table = read_table(path)?;
    table.require("video_id")?;
    table.require("title")?;
    Ok(table)
}

/// Read a membership table; requires `video_id` and `playlist_title`
pub fn read_membership(path: &Path) -> Result<Table> {
    let table = read_table(path)?;
    table.require("video_id")?;
    table.require("playlist_title")?;
    Ok(table)
}

/// Make a category or playlist name safe to use as a file name
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_FILE_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write one table as UTF-8 CSV with a BOM and header row
pub fn write_table(path: &Path, headers: &StringRecord, rows: &[StringRecord]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// A named group of rows destined for one output file
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

/// Write every partition into `dir`, one file each; returns the paths.
/// Names that sanitize to the same file get a numeric suffix.
pub fn write_partitions(dir: &Path, partitions: &[Partition]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut used = HashSet::new();
    let mut paths = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let base = sanitize_file_name(&partition.name);
        let mut file_name = format!("{}.csv", base);
        let mut n = 2;
        while !used.insert(file_name.to_lowercase()) {
            file_name = format!("{}_{}.csv", base, n);
            n += 1;
        }

        let path = dir.join(&file_name);
        write_table(&path, &partition.headers, &partition.rows)?;
        info!("💾 Saved: {} ({} videos)", file_name, partition.rows.len());
        paths.push(path);
    }

    debug!("Wrote {} partition files to {}", paths.len(), dir.display());
    Ok(paths)
}
