//! # Doc Sync
//!
//! Reconciles a directory tree of front-matter documents against a record
//! store.
//!
//! Each pass marks every stored record `lost_sync`, then walks the source
//! tree: every file is parsed into a [`Document`](models::Document),
//! matched to a record by title, and the record is created, overwritten or
//! left alone depending on what changed. Records no file claimed stay
//! `lost_sync` and are reported as orphans; nothing is ever deleted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Scanner  │──▶│  Parser  │──▶│  Change  │──▶│  Store   │
//! │ walkdir  │   │ YAML/FM  │   │ Detector │   │ SQLite   │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘
//!        ╰──────────── SyncEngine (one pass) ───────────╯
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync init                  # create database
//! docsync sync --dry-run        # preview decisions
//! docsync sync                  # reconcile
//! docsync list --status lost_sync
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, records, counters |
//! | [`parse`] | Front matter and legacy file parsing |
//! | [`change`] | Record vs document comparison |
//! | [`scan`] | Source tree enumeration |
//! | [`store`] | Store trait, SQLite and in-memory backends |
//! | [`sync`] | Sync pass and status preview |
//! | [`stats`] | Store statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod change;
pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod report;
pub mod scan;
pub mod stats;
pub mod store;
pub mod sync;
