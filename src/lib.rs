//! # rapor
//!
//! Field extraction and analytics for bilingual (Turkish/English)
//! Siemens-format service-report PDFs.
//!
//! rapor extracts plain text from a batch of report PDFs, asks a
//! chat-completion model to pull a fixed set of eight fields out of each
//! report, tabulates the results in an in-memory session table, and renders
//! that table as an XLSX export plus terminal dashboard views.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │   PDFs   │──▶│   Pipeline    │──▶│ ResultTable │
//! │ (batch)  │   │ Extract+LLM  │   │ (session)   │
//! └──────────┘   └──────────────┘   └─────┬───────┘
//!                                         │
//!                           ┌─────────────┤
//!                           ▼             ▼
//!                     ┌──────────┐  ┌───────────┐
//!                     │   XLSX   │  │ Dashboard │
//!                     │  export  │  │  (stats)  │
//!                     └──────────┘  └───────────┘
//! ```
//!
//! Processing is strictly sequential: each document fully completes
//! extract → analyze → aggregate before the next begins, and a
//! per-document failure skips that document without aborting the batch.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types (field set, records, table, outcomes) |
//! | [`extract`] | PDF text extraction and Turkish mojibake correction |
//! | [`analyze`] | Chat-completion field extraction client |
//! | [`batch`] | Sequential batch fold with per-document skip semantics |
//! | [`session`] | Session-scoped table shared by the two surfaces |
//! | [`export`] | XLSX serialization of the table |
//! | [`analytics`] | Dashboard aggregates (counts, buckets, trend) |
//! | [`progress`] | Batch progress reporting |

pub mod analytics;
pub mod analyze;
pub mod batch;
pub mod config;
pub mod export;
pub mod extract;
pub mod models;
pub mod progress;
pub mod session;
