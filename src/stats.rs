//! Store statistics.
//!
//! A quick summary of what the store holds: record counts per status and
//! per category, plus how many distinct authors and tags are in use. Used
//! by `docsync stats`.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStatistics {
    pub total_records: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub distinct_authors: usize,
    pub distinct_tags: usize,
}

/// Label used for records with no status or category.
const NONE_LABEL: &str = "(none)";

pub async fn collect_statistics<S: Store + ?Sized>(store: &S) -> Result<StoreStatistics> {
    let records = store.list_all().await?;

    let mut stats = StoreStatistics {
        total_records: records.len(),
        ..Default::default()
    };
    let mut authors = BTreeSet::new();
    let mut tags = BTreeSet::new();

    for record in &records {
        let status = record.status.as_deref().unwrap_or(NONE_LABEL);
        *stats.by_status.entry(status.to_string()).or_default() += 1;
        let category = record.category.as_deref().unwrap_or(NONE_LABEL);
        *stats.by_category.entry(category.to_string()).or_default() += 1;
        authors.extend(record.authors.iter().map(String::as_str));
        tags.extend(record.tags.iter().map(String::as_str));
    }

    stats.distinct_authors = authors.len();
    stats.distinct_tags = tags.len();
    Ok(stats)
}

pub fn print_statistics(stats: &StoreStatistics, db_path: &Path) {
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Doc Sync: Store Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", stats.total_records);
    println!("  Authors:     {}", stats.distinct_authors);
    println!("  Tags:        {}", stats.distinct_tags);

    print_breakdown("By status:", "STATUS", &stats.by_status);
    print_breakdown("By category:", "CATEGORY", &stats.by_category);

    println!();
}

fn print_breakdown(heading: &str, column: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  {}", heading);
    println!("  {:<32} {:>8}", column, "RECORDS");
    println!("  {}", "-".repeat(41));
    for (name, count) in counts {
        println!("  {:<32} {:>8}", name, count);
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::store::memory::InMemoryStore;
    use chrono::Utc;

    fn doc(title: &str, category: &str, authors: &[&str], tags: &[&str]) -> Document {
        let now = Utc::now();
        Document {
            title: title.to_string(),
            content: format!("content of {title}"),
            summary: String::new(),
            category: category.to_string(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            status: "published".to_string(),
            created_time: now,
            updated_time: now,
        }
    }

    #[tokio::test]
    async fn test_collect_statistics() {
        let store = InMemoryStore::new();
        store
            .create(&doc("a", "rust", &["amy"], &["x", "y"]))
            .await
            .unwrap();
        let b = store
            .create(&doc("b", "rust", &["amy", "bo"], &["y"]))
            .await
            .unwrap();
        store
            .create(&doc("c", "ops", &["cy"], &["z"]))
            .await
            .unwrap();
        store.set_status(&b.id, "lost_sync").await.unwrap();

        let stats = collect_statistics(&store).await.unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.by_status["published"], 2);
        assert_eq!(stats.by_status["lost_sync"], 1);
        assert_eq!(stats.by_category["rust"], 2);
        assert_eq!(stats.distinct_authors, 3);
        assert_eq!(stats.distinct_tags, 3);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
