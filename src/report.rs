//! Plain-text rendering of sync results for the CLI.

use crate::models::{Record, StatusReport, SyncStats};

pub fn print_sync_stats(stats: &SyncStats) {
    if stats.dry_run {
        println!("sync (dry-run)");
    } else {
        println!("sync");
    }
    println!("  total files: {}", stats.total_files);
    println!("  created: {}", stats.created);
    println!("  updated: {}", stats.updated);
    println!("  skipped: {}", stats.skipped);
    println!("  failed: {}", stats.failed);
    println!("  orphaned: {}", stats.orphaned);

    if !stats.failures.is_empty() {
        println!();
        println!("  failures:");
        for failure in &stats.failures {
            println!("    - {} [{}] {}", failure.path, failure.kind, failure.message);
        }
    }

    if !stats.orphan_titles.is_empty() {
        println!();
        println!("  records with no source file (lost_sync):");
        for title in &stats.orphan_titles {
            println!("    - {}", title);
        }
    }

    println!("ok");
}

pub fn print_status_report(report: &StatusReport) {
    print_bucket("files only in source", &report.files_only_in_source);
    print_bucket("records only in store", &report.records_only_in_store);
    print_bucket("in both", &report.in_both);
}

fn print_bucket(label: &str, items: &[String]) {
    println!("{}: {}", label, items.len());
    for item in items {
        println!("  - {}", item);
    }
}

pub fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }

    println!(
        "{:<36}  {:<12}  {:<16}  {}",
        "ID", "STATUS", "CATEGORY", "TITLE"
    );
    for record in records {
        println!(
            "{:<36}  {:<12}  {:<16}  {}",
            record.id,
            record.status.as_deref().unwrap_or("-"),
            record.category.as_deref().unwrap_or("-"),
            record.title
        );
    }
    println!();
    println!("{} record(s)", records.len());
}
