//! Offline CSV partitioning of pre-fetched channel metadata
//!
//! Three variants share the same loading, reporting and writing steps:
//! title categories, playlist membership, and keyword groups.

pub mod category;
pub mod csv_io;
pub mod partition;

pub use category::{CategoryExtractor, CategoryRule, SubRule, UNCATEGORIZED};
pub use csv_io::{sanitize_file_name, write_partitions, Partition, Table};
pub use partition::{KeywordGroup, PartitionReport};

use std::path::PathBuf;
use tracing::info;

use crate::config::BatchConfig;
use crate::error::Result;

/// Result of one batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub report: PartitionReport,
    pub written: Vec<PathBuf>,
}

fn log_report(variant: &str, report: &PartitionReport) {
    info!("{}", "-".repeat(40));
    info!(
        "📊 {}: {} partitions, {} rows in, {} rows written",
        variant,
        report.partitions.len(),
        report.rows_in,
        report.rows_written
    );
    info!(
        "   excluded: {}, never matched: {}, orphaned: {}",
        report.excluded, report.unmatched, report.orphaned
    );
}

/// Partition the metadata table by extracted title category
pub fn categorize(config: &BatchConfig) -> Result<BatchOutcome> {
    let extractor = CategoryExtractor::new(&config.organization_name, config.category_rules.clone())?;
    let table = csv_io::read_metadata(&config.metadata_file)?;

    let (partitions, report) = partition::by_category(&table, &extractor, &config.excluded_categories)?;
    info!(
        "Found {} categories: {:?}",
        partitions.len(),
        partitions.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
    );

    let written = write_partitions(&config.category_output_dir, &partitions)?;
    log_report("categorize", &report);
    Ok(BatchOutcome { report, written })
}

/// Partition by playlist using the membership table
pub fn split_by_playlist(config: &BatchConfig) -> Result<BatchOutcome> {
    let metadata = csv_io::read_metadata(&config.metadata_file)?;
    let membership = csv_io::read_membership(&config.mapping_file)?;
    info!("Filtering out playlists: {:?}", config.excluded_playlists);

    let (partitions, report) =
        partition::by_playlist(&metadata, &membership, &config.excluded_playlists)?;

    let written = write_partitions(&config.playlist_output_dir, &partitions)?;
    log_report("split-playlists", &report);
    Ok(BatchOutcome { report, written })
}

/// Partition by configured keyword groups
pub fn split_by_keywords(config: &BatchConfig) -> Result<BatchOutcome> {
    let table = csv_io::read_metadata(&config.metadata_file)?;
    info!("Total videos to analyze: {}", table.len());

    let (partitions, report) = partition::by_keyword_groups(
        &table,
        &config.keyword_groups,
        &config.keyword_exclude_terms,
    )?;

    let written = write_partitions(&config.keyword_output_dir, &partitions)?;
    log_report("keyword-split", &report);
    Ok(BatchOutcome { report, written })
}
