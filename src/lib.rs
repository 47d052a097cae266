//! # History Sync
//!
//! Incremental browser-history sync into a DiMe event-collection server.
//!
//! Each invocation inspects one browser's history database, works out which
//! visits are new since the last run, turns them into DiMe events and
//! documents with content-derived identities, and delivers each event to the
//! server exactly once per identity.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌────────┐   ┌───────────┐   ┌────────┐
//! │Fingerprint│──▶│ Snapshot │──▶│ Filter │──▶│ Normalize │──▶│ Dedup  │
//! │ (changed?)│   │ (copy+   │   │(deny-  │   │ (ids)     │   │ store  │
//! └───────────┘   │  query)  │   │ list)  │   └───────────┘   └───┬────┘
//!                 └──────────┘   └────────┘                       │
//!                                       ┌──────────┐   ┌──────────▼─┐
//!                                       │   Sink   │◀──│  Enrich    │
//!                                       │ (DiMe)   │   │ (fulltext) │
//!                                       └──────────┘   └────────────┘
//! ```
//!
//! [`pipeline::Pipeline`] drives the stages; [`state`] persists fingerprints
//! and known identities between runs.
//!
//! ## Quick Start
//!
//! ```bash
//! hsync init                 # create the state database
//! hsync loggers              # check configured history files
//! hsync sync firefox         # one incremental run
//! hsync status               # totals and last success per logger
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Records, documents, events (DiMe wire format) |
//! | [`fingerprint`] | Source change detection |
//! | [`snapshot`] | Isolated history copy and visit query |
//! | [`filter`] | Locator denylist |
//! | [`classify`] | Storage class and MIME type of a locator |
//! | [`normalize`] | Record → document/event with content identities |
//! | [`dedup`] | Known event and document identities |
//! | [`enrich`] | Full-text extraction |
//! | [`sink`] | DiMe delivery client |
//! | [`pipeline`] | Run controller |
//! | [`state`] | Persisted run state and pruning |

pub mod classify;
pub mod config;
pub mod db;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prune;
pub mod sink;
pub mod snapshot;
pub mod sources;
pub mod state;
pub mod stats;
