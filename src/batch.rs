//! Batch pipeline orchestration.
//!
//! Coordinates the full flow for one batch of reports: extract text →
//! analyze fields → append to the result table. Processing is strictly
//! sequential: each document's extract-analyze-aggregate sequence fully
//! completes before the next begins. A per-document failure is recorded as
//! a skipped outcome with its reason and never aborts the fold.

use chrono::Local;
use tracing::{info, warn};

use crate::analyze::{self, ChatBackend};
use crate::config::ModelConfig;
use crate::extract;
use crate::models::{
    BatchReport, DocumentOutcome, DocumentStatus, FieldSet, ResultRecord, SkipReason,
};
use crate::progress::{BatchProgressEvent, BatchProgressReporter};

/// A PDF handed to the batch: its bytes plus a display name.
/// Lives only for the duration of one extraction call.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Run one batch: fold the document list into a [`BatchReport`].
///
/// For every document the fold produces either a table record or a skipped
/// outcome with a [`SkipReason`]; skips are surfaced as warnings but the
/// fold continues. The returned table is built fresh here and replaces the
/// previous session table wholesale at the caller.
pub async fn run_batch(
    backend: &dyn ChatBackend,
    model: &ModelConfig,
    documents: &[InputDocument],
    progress: &dyn BatchProgressReporter,
) -> BatchReport {
    let mut report = BatchReport::default();
    let total = documents.len() as u64;

    for (i, doc) in documents.iter().enumerate() {
        progress.report(BatchProgressEvent::Processing {
            file_name: doc.name.clone(),
            n: i as u64 + 1,
            total,
        });

        let status = match process_document(backend, model, doc).await {
            Ok(fields) => {
                info!(file = %doc.name, "analyzed");
                report
                    .table
                    .push(ResultRecord::new(fields, &doc.name, Local::now()));
                DocumentStatus::Analyzed
            }
            Err(reason) => {
                warn!(file = %doc.name, %reason, "skipped");
                DocumentStatus::Skipped(reason)
            }
        };

        report.outcomes.push(DocumentOutcome {
            file_name: doc.name.clone(),
            status,
        });
    }

    progress.report(BatchProgressEvent::Finished {
        succeeded: report.succeeded() as u64,
        total,
    });

    report
}

/// One document through the extract → analyze sequence.
async fn process_document(
    backend: &dyn ChatBackend,
    model: &ModelConfig,
    doc: &InputDocument,
) -> Result<FieldSet, SkipReason> {
    let text = extract::extract_text(&doc.bytes).ok_or(SkipReason::Unreadable)?;

    analyze::analyze_text(backend, model, &text)
        .await
        .map_err(|e| SkipReason::ModelFailure(e.to_string()))
}
