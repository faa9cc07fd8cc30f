//! Sync pass orchestration.
//!
//! A pass moves through `Init → MarkTentative → Scanning → Reconciling →
//! Reporting → Done`. Every existing record is first marked `lost_sync`;
//! each source file then claims its record (create, update or status
//! reset), and whatever is still `lost_sync` at the end is reported as
//! orphaned. Records are never deleted.
//!
//! Only a failure to ensure the store schema aborts a pass. Per-file
//! problems are counted, logged and kept in [`SyncStats::failures`].

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::change;
use crate::config::SourceConfig;
use crate::error::SyncError;
use crate::models::{
    content_hash, Document, FailureKind, FileFailure, MatchKey, Record, RecordUpdate,
    StatusReport, SyncStats, STATUS_LOST_SYNC,
};
use crate::parse::parse_file;
use crate::scan::{Scanner, SourceFile};
use crate::store::Store;

/// Phases of a sync pass. `Aborted` is only reachable from `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Init,
    MarkTentative,
    Scanning,
    Reconciling,
    Reporting,
    Done,
    Aborted,
}

impl SyncPhase {
    fn can_advance_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Init, MarkTentative)
                | (Init, Scanning)
                | (Init, Aborted)
                | (MarkTentative, Scanning)
                | (Scanning, Reconciling)
                | (Scanning, Done)
                | (Reconciling, Reporting)
                | (Reporting, Done)
        )
    }
}

struct PassState {
    phase: SyncPhase,
}

impl PassState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Init,
        }
    }

    fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal sync transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(from = ?self.phase, to = ?next, "sync phase");
        self.phase = next;
    }
}

/// What happened to one file during `Reconciling`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Would-be store state during a dry run, so later files in the same pass
/// see the effect of earlier ones without anything being written.
#[derive(Default)]
struct DryRunOverlay {
    by_title: HashMap<String, Record>,
}

impl DryRunOverlay {
    fn record(&mut self, doc: &Document, id: Option<&str>) {
        let record = Record {
            id: id.unwrap_or_default().to_string(),
            title: doc.title.clone(),
            content: doc.content.clone(),
            summary: doc.summary.clone(),
            category: Some(doc.category.clone()),
            authors: doc.authors.clone(),
            tags: doc.tags.clone(),
            status: Some(doc.status.clone()),
            hash: content_hash(&doc.content),
            created_time: doc.created_time,
            updated_time: doc.updated_time,
        };
        self.by_title.insert(doc.title.clone(), record);
    }

    /// True when this pass already plans to give `title` different content,
    /// freeing the hash the store still shows for it.
    fn moved_away(&self, title: &str, hash: &str) -> bool {
        self.by_title
            .get(title)
            .is_some_and(|planned| planned.hash != hash)
    }

    fn hash_owner(&self, hash: &str, except_title: &str) -> Option<String> {
        self.by_title
            .values()
            .find(|r| r.hash == hash && r.title != except_title)
            .map(|r| r.title.clone())
    }
}

/// Reconciles a source tree against a [`Store`].
pub struct SyncEngine<'a, S: Store + ?Sized> {
    store: &'a S,
    scanner: Scanner,
    match_key: MatchKey,
}

impl<'a, S: Store + ?Sized> SyncEngine<'a, S> {
    /// Fails only if the source globs do not compile.
    pub fn new(store: &'a S, source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            store,
            scanner: Scanner::new(source)?,
            match_key: MatchKey::default(),
        })
    }

    /// Run one full pass over `root`.
    ///
    /// With `dry_run` every decision is made and counted but the store is
    /// never written to. The orphan report still runs and shows records left
    /// `lost_sync` by an earlier pass.
    pub async fn run_sync(&self, root: &Path, dry_run: bool) -> Result<SyncStats> {
        let mut state = PassState::new();
        let mut stats = SyncStats {
            dry_run,
            ..Default::default()
        };

        if let Err(e) = self.store.ensure_schema().await {
            state.advance(SyncPhase::Aborted);
            tracing::error!(error = %e, "cannot ensure store schema, aborting sync");
            return Err(SyncError::Schema {
                message: format!("{e:#}"),
            }
            .into());
        }

        let prior_status = if dry_run {
            HashMap::new()
        } else {
            state.advance(SyncPhase::MarkTentative);
            self.mark_tentative().await
        };

        state.advance(SyncPhase::Scanning);
        let files = self.scanner.scan(root);
        stats.total_files = files.len();
        tracing::info!(root = %root.display(), files = files.len(), dry_run, "scanned source tree");

        if files.is_empty() {
            state.advance(SyncPhase::Done);
            return Ok(stats);
        }

        state.advance(SyncPhase::Reconciling);
        let mut overlay = DryRunOverlay::default();
        for file in &files {
            let result = if dry_run {
                self.preview_file(file, &mut overlay).await
            } else {
                self.reconcile_file(file, &prior_status).await
            };

            match result {
                Ok(Outcome::Created) => stats.created += 1,
                Ok(Outcome::Updated) => stats.updated += 1,
                Ok(Outcome::Unchanged) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    let kind = classify(&e);
                    tracing::warn!(path = %file.relative, kind = %kind, error = %e, "failed to sync file");
                    stats.failures.push(FileFailure {
                        path: file.relative.clone(),
                        kind,
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        state.advance(SyncPhase::Reporting);
        match self.store.list_by_status(STATUS_LOST_SYNC).await {
            Ok(orphans) => {
                for record in &orphans {
                    tracing::warn!(title = %record.title, "record has no source file (lost_sync)");
                }
                stats.orphaned = orphans.len();
                stats.orphan_titles = orphans.into_iter().map(|r| r.title).collect();
            }
            Err(e) => tracing::warn!(error = %e, "failed to list lost_sync records"),
        }

        state.advance(SyncPhase::Done);
        tracing::info!(
            total = stats.total_files,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            orphaned = stats.orphaned,
            dry_run,
            "sync finished"
        );
        Ok(stats)
    }

    /// Mark every record `lost_sync`, returning the status each one held
    /// before so unchanged documents compare against their real status.
    async fn mark_tentative(&self) -> HashMap<String, Option<String>> {
        let records = match self.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list records for lost_sync marking");
                return HashMap::new();
            }
        };

        let mut prior = HashMap::with_capacity(records.len());
        for record in records {
            match self.store.set_status(&record.id, STATUS_LOST_SYNC).await {
                Ok(()) => {
                    prior.insert(record.id, record.status);
                }
                Err(e) => {
                    tracing::warn!(title = %record.title, error = %e, "failed to mark record lost_sync")
                }
            }
        }
        tracing::info!(marked = prior.len(), "marked records as lost_sync");
        prior
    }

    async fn reconcile_file(
        &self,
        file: &SourceFile,
        prior_status: &HashMap<String, Option<String>>,
    ) -> Result<Outcome> {
        let doc = parse_file(&file.path)?;
        let key = self.match_key.key_of(&doc);

        let Some(mut record) = self.store.get_by_title(key).await? else {
            self.store.create(&doc).await?;
            tracing::info!(title = %doc.title, path = %file.relative, "created record");
            return Ok(Outcome::Created);
        };

        // Still carrying this pass's tentative marker: judge it by the status
        // it had before the pass started.
        if record.is_lost_sync() {
            if let Some(status) = prior_status.get(&record.id) {
                record.status = status.clone();
            }
        }

        match change::diff(&record, &doc) {
            Some(reason) => {
                self.store
                    .update(&record.id, &RecordUpdate::from(&doc))
                    .await?;
                tracing::info!(title = %doc.title, changed = %reason, "updated record");
                Ok(Outcome::Updated)
            }
            None => {
                self.store.set_status(&record.id, &doc.status).await?;
                tracing::info!(title = %doc.title, "unchanged");
                Ok(Outcome::Unchanged)
            }
        }
    }

    /// Dry-run counterpart of [`reconcile_file`](Self::reconcile_file): same
    /// decisions, including duplicate-content rejections, with no writes.
    async fn preview_file(&self, file: &SourceFile, overlay: &mut DryRunOverlay) -> Result<Outcome> {
        let doc = parse_file(&file.path)?;
        let key = self.match_key.key_of(&doc);

        let existing = match overlay.by_title.get(key) {
            Some(planned) => Some(planned.clone()),
            None => self.store.get_by_title(key).await?,
        };

        let outcome = match &existing {
            None => {
                if let Some(existing_title) = self.hash_owner(overlay, &doc, None).await? {
                    return Err(duplicate(&doc, existing_title));
                }
                tracing::info!(title = %doc.title, path = %file.relative, "would create record");
                Outcome::Created
            }
            Some(record) => match change::diff(record, &doc) {
                Some(reason) => {
                    if let Some(existing_title) =
                        self.hash_owner(overlay, &doc, Some(record.id.as_str())).await?
                    {
                        return Err(duplicate(&doc, existing_title));
                    }
                    tracing::info!(title = %doc.title, changed = %reason, "would update record");
                    Outcome::Updated
                }
                None => {
                    tracing::info!(title = %doc.title, "unchanged");
                    Outcome::Unchanged
                }
            },
        };

        let id = existing.as_ref().map(|r| r.id.clone());
        overlay.record(&doc, id.as_deref());
        Ok(outcome)
    }

    /// Title of another record, planned or stored, that already holds the
    /// content hash of `doc`.
    async fn hash_owner(
        &self,
        overlay: &DryRunOverlay,
        doc: &Document,
        except_id: Option<&str>,
    ) -> Result<Option<String>> {
        let hash = doc.content_hash();
        if let Some(title) = overlay.hash_owner(&hash, &doc.title) {
            return Ok(Some(title));
        }
        Ok(self
            .store
            .get_by_hash(&hash)
            .await?
            .filter(|r| Some(r.id.as_str()) != except_id && r.title != doc.title)
            .filter(|r| !overlay.moved_away(&r.title, &hash))
            .map(|r| r.title))
    }

    /// Classify source files against store records by content hash without
    /// mutating any record.
    pub async fn preview_status(&self, root: &Path) -> Result<StatusReport> {
        self.store
            .ensure_schema()
            .await
            .map_err(|e| SyncError::Schema {
                message: format!("{e:#}"),
            })?;

        let records = self.store.list_all().await?;
        let store_hashes: HashSet<&str> = records.iter().map(|r| r.hash.as_str()).collect();

        let mut report = StatusReport::default();
        let mut file_hashes = HashSet::new();
        for file in self.scanner.scan(root) {
            let doc = match parse_file(&file.path) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(path = %file.relative, error = %e, "skipping unparsable file");
                    continue;
                }
            };
            let hash = doc.content_hash();
            if store_hashes.contains(hash.as_str()) {
                report.in_both.push(file.relative);
            } else {
                report.files_only_in_source.push(file.relative);
            }
            file_hashes.insert(hash);
        }

        report.records_only_in_store = records
            .iter()
            .filter(|r| !file_hashes.contains(&r.hash))
            .map(|r| r.title.clone())
            .collect();

        Ok(report)
    }
}

fn duplicate(doc: &Document, existing_title: String) -> anyhow::Error {
    SyncError::DuplicateContent {
        title: doc.title.clone(),
        existing_title,
        hash: doc.content_hash(),
    }
    .into()
}

fn classify(e: &anyhow::Error) -> FailureKind {
    match e.downcast_ref::<SyncError>() {
        Some(SyncError::Parse { .. }) | Some(SyncError::ReservedStatus(_)) => FailureKind::Parse,
        Some(SyncError::DuplicateContent { .. }) => FailureKind::DuplicateContent,
        _ => FailureKind::Store,
    }
}
