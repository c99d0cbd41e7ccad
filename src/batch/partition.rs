/// Partitioning of metadata rows by category, playlist or keyword group
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::category::CategoryExtractor;
use super::csv_io::{Partition, Table};
use crate::error::Result;

/// Columns written by the playlist variant, when present in the inputs
pub const PLAYLIST_OUTPUT_COLUMNS: &[&str] = &[
    "video_id",
    "title",
    "url",
    "published_at",
    "view_count",
    "duration",
    "position",
];

/// Row accounting for one partitioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Input rows considered
    pub rows_in: usize,
    /// Rows written across all partitions (a row may be written more than once)
    pub rows_written: usize,
    /// Rows dropped by an explicit exclusion list
    pub excluded: usize,
    /// Rows that never matched any partition
    pub unmatched: usize,
    /// Membership rows whose video is missing from the metadata table
    pub orphaned: usize,
    /// `(partition name, row count)` in output order
    pub partitions: Vec<(String, usize)>,
}

impl PartitionReport {
    fn finish(mut self, partitions: &[Partition]) -> Self {
        self.partitions = partitions
            .iter()
            .map(|p| (p.name.clone(), p.rows.len()))
            .collect();
        self.rows_written = partitions.iter().map(|p| p.rows.len()).sum();
        self
    }
}

/// Keyword group for the keyword-split variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn default_groups() -> Vec<KeywordGroup> {
        let group = |label: &str, keywords: &[&str]| KeywordGroup {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        vec![
            group("새벽예배", &["새벽"]),
            group("수요예배", &["수요"]),
            group("금요철야", &["금요", "철야"]),
            group("주일예배", &["주일"]),
            group("청년부예배", &["청년"]),
        ]
    }
}

/// Keeps partitions in first-seen order
struct PartitionBuilder {
    headers: StringRecord,
    order: Vec<Partition>,
    positions: HashMap<String, usize>,
}

impl PartitionBuilder {
    fn new(headers: StringRecord) -> Self {
        Self {
            headers,
            order: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn push(&mut self, name: &str, row: StringRecord) {
        let position = match self.positions.get(name) {
            Some(&p) => p,
            None => {
                self.order.push(Partition {
                    name: name.to_string(),
                    headers: self.headers.clone(),
                    rows: Vec::new(),
                });
                self.positions.insert(name.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        self.order[position].rows.push(row);
    }

    fn build(self) -> Vec<Partition> {
        self.order
    }
}

/// One partition per extracted title category. Rows that match nothing
/// land in the uncategorized partition; only `excluded` categories are
/// left out.
pub fn by_category(
    table: &Table,
    extractor: &CategoryExtractor,
    excluded: &[String],
) -> Result<(Vec<Partition>, PartitionReport)> {
    let title_col = table.require("title")?;
    let mut builder = PartitionBuilder::new(table.headers.clone());
    let mut report = PartitionReport {
        rows_in: table.len(),
        ..Default::default()
    };

    for row in &table.rows {
        let category = extractor.extract(Table::cell(row, title_col));
        if excluded.iter().any(|e| e == &category) {
            report.excluded += 1;
            continue;
        }
        builder.push(&category, row.clone());
    }

    let partitions = builder.build();
    let report = report.finish(&partitions);
    Ok((partitions, report))
}

/// One partition per playlist from the membership table, joined with the
/// metadata table on `video_id`. Every (video, playlist) pair is kept.
pub fn by_playlist(
    metadata: &Table,
    membership: &Table,
    excluded_playlists: &[String],
) -> Result<(Vec<Partition>, PartitionReport)> {
    let meta_id_col = metadata.require("video_id")?;
    let map_id_col = membership.require("video_id")?;
    let playlist_col = membership.require("playlist_title")?;

    // Output column -> (from membership?, source index)
    let mut columns: Vec<(&str, bool, usize)> = Vec::new();
    for &name in PLAYLIST_OUTPUT_COLUMNS {
        if let Some(i) = metadata.column(name) {
            columns.push((name, false, i));
        } else if let Some(i) = membership.column(name) {
            columns.push((name, true, i));
        }
    }
    let headers = StringRecord::from(columns.iter().map(|(n, _, _)| *n).collect::<Vec<_>>());

    let mut meta_by_id: HashMap<&str, Vec<&StringRecord>> = HashMap::new();
    for row in &metadata.rows {
        meta_by_id
            .entry(Table::cell(row, meta_id_col))
            .or_default()
            .push(row);
    }

    let mut builder = PartitionBuilder::new(headers);
    let mut report = PartitionReport {
        rows_in: membership.len(),
        ..Default::default()
    };
    let mut placed: HashSet<&str> = HashSet::new();

    for link in &membership.rows {
        let playlist = Table::cell(link, playlist_col);
        if excluded_playlists.iter().any(|e| e == playlist) {
            report.excluded += 1;
            continue;
        }

        let video_id = Table::cell(link, map_id_col);
        let Some(meta_rows) = meta_by_id.get(video_id) else {
            report.orphaned += 1;
            continue;
        };

        for meta in meta_rows {
            let record: StringRecord = columns
                .iter()
                .map(|&(_, from_membership, i)| {
                    if from_membership {
                        Table::cell(link, i)
                    } else {
                        Table::cell(meta, i)
                    }
                })
                .collect();
            builder.push(playlist, record);
        }
        placed.insert(video_id);
    }

    let distinct_ids: HashSet<&str> = meta_by_id.keys().copied().collect();
    report.unmatched = distinct_ids.difference(&placed).count();

    let partitions = builder.build();
    let report = report.finish(&partitions);
    Ok((partitions, report))
}

/// One partition per keyword group (case-insensitive containment). A row
/// may land in several groups; rows containing an exclusion term are
/// left out of every group.
pub fn by_keyword_groups(
    table: &Table,
    groups: &[KeywordGroup],
    exclude_terms: &[String],
) -> Result<(Vec<Partition>, PartitionReport)> {
    let title_col = table.require("title")?;
    let exclude_terms: Vec<String> = exclude_terms.iter().map(|t| t.to_lowercase()).collect();
    let mut report = PartitionReport {
        rows_in: table.len(),
        ..Default::default()
    };
    let mut grouped: Vec<Vec<StringRecord>> = vec![Vec::new(); groups.len()];

    for row in &table.rows {
        let title = Table::cell(row, title_col).to_lowercase();
        if exclude_terms.iter().any(|t| !t.is_empty() && title.contains(t.as_str())) {
            report.excluded += 1;
            continue;
        }

        let mut matched = false;
        for (group, rows) in groups.iter().zip(grouped.iter_mut()) {
            let hit = group
                .keywords
                .iter()
                .any(|k| !k.is_empty() && title.contains(&k.to_lowercase()));
            if hit {
                rows.push(row.clone());
                matched = true;
            }
        }
        if !matched {
            report.unmatched += 1;
        }
    }

    let partitions: Vec<Partition> = groups
        .iter()
        .zip(grouped)
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(group, rows)| Partition {
            name: group.label.clone(),
            headers: table.headers.clone(),
            rows,
        })
        .collect();

    let report = report.finish(&partitions);
    Ok((partitions, report))
}
