//! Integration tests for the batch pipeline.
//!
//! Drives the full extract → analyze → aggregate fold with hand-built PDF
//! fixtures and a scripted chat backend, so every path through the skip
//! semantics is exercised without touching the network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use rapor::analyze::{self, AnalyzeError, ChatBackend, ChatRequest};
use rapor::batch::{self, InputDocument};
use rapor::config::ModelConfig;
use rapor::extract;
use rapor::models::{DocumentStatus, SkipReason};
use rapor::progress::NoProgress;

/// Minimal valid single-page PDF containing `phrase`.
/// Builds the body then the xref with correct byte offsets.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!("4 0 obj << /Length {} >> stream\n{}endstream endobj\n", stream.len(), stream)
            .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// A PDF whose page tree is empty (zero pages).
fn zero_page_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 3\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 3 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Chat backend that replays canned replies in order and records every
/// request it receives.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, AnalyzeError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted backend ran out of replies");
        reply.map_err(AnalyzeError::Api)
    }
}

const VALID_REPLY: &str = r#"{
    "Restoration_Time": "12/03/2024",
    "Work_Carried_Out": "Routine maintenance and check performed",
    "Product_Number": "6ES7515-2AM01",
    "Customer_Company": "TÜPRAŞ",
    "Customer_Location": "KIRIKKALE",
    "Service_Engineer": "Kadir Adıgüzel",
    "Conclusion": "No recurring faults observed",
    "EQ_No_End_Customer": "EQ-104"
}"#;

#[test]
fn extractor_reads_minimal_pdf() {
    let pdf = minimal_pdf_with_phrase("Siemens service report sample content");
    let text = extract::extract_text(&pdf).expect("text should be extracted");
    assert!(text.contains("Siemens service report sample content"));
}

#[test]
fn extractor_rejects_zero_page_pdf() {
    assert_eq!(extract::extract_text(&zero_page_pdf()), None);
}

#[test]
fn extractor_rejects_near_empty_text() {
    // One page, but fewer than 10 non-whitespace characters.
    let pdf = minimal_pdf_with_phrase("short");
    assert_eq!(extract::extract_text(&pdf), None);
}

#[tokio::test]
async fn batch_of_three_skips_without_aborting() {
    // A: valid text and a valid model reply. B: unreadable bytes.
    // C: valid text but an unparsable reply.
    let documents = vec![
        InputDocument::new(
            "a.pdf",
            minimal_pdf_with_phrase("Siemens service report sample content"),
        ),
        InputDocument::new("b.pdf", b"not a pdf at all".to_vec()),
        InputDocument::new(
            "c.pdf",
            minimal_pdf_with_phrase("another report with enough text in it"),
        ),
    ];
    let backend = ScriptedBackend::new(vec![
        Ok(VALID_REPLY.to_string()),
        Ok("I could not find any fields in this report.".to_string()),
    ]);

    let model = ModelConfig::default();
    let report = batch::run_batch(&backend, &model, &documents, &NoProgress).await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.skipped(), 2);
    assert!((report.success_rate() - 33.3).abs() < 0.1);

    assert_eq!(report.table.len(), 1);
    let record = &report.table.records()[0];
    assert_eq!(record.file_name, "a.pdf");
    assert_eq!(record.fields.customer_company, "TÜPRAŞ");
    assert_eq!(record.fields.equipment_number, "EQ-104");

    assert!(matches!(report.outcomes[0].status, DocumentStatus::Analyzed));
    assert!(matches!(
        report.outcomes[1].status,
        DocumentStatus::Skipped(SkipReason::Unreadable)
    ));
    assert!(matches!(
        report.outcomes[2].status,
        DocumentStatus::Skipped(SkipReason::ModelFailure(_))
    ));
}

#[tokio::test]
async fn transport_error_skips_document() {
    let documents = vec![InputDocument::new(
        "a.pdf",
        minimal_pdf_with_phrase("Siemens service report sample content"),
    )];
    let backend = ScriptedBackend::new(vec![Err("HTTP 500: upstream unavailable".to_string())]);

    let model = ModelConfig::default();
    let report = batch::run_batch(&backend, &model, &documents, &NoProgress).await;

    assert_eq!(report.succeeded(), 0);
    assert!(report.table.is_empty());
    assert!(matches!(
        report.outcomes[0].status,
        DocumentStatus::Skipped(SkipReason::ModelFailure(_))
    ));
}

#[tokio::test]
async fn fenced_reply_produces_same_record_as_plain() {
    let pdf = minimal_pdf_with_phrase("Siemens service report sample content");
    let model = ModelConfig::default();

    let plain = ScriptedBackend::new(vec![Ok(VALID_REPLY.to_string())]);
    let fenced = ScriptedBackend::new(vec![Ok(format!("```json\n{}\n```", VALID_REPLY))]);

    let docs = vec![InputDocument::new("r.pdf", pdf)];
    let from_plain = batch::run_batch(&plain, &model, &docs, &NoProgress).await;
    let from_fenced = batch::run_batch(&fenced, &model, &docs, &NoProgress).await;

    assert_eq!(
        from_plain.table.records()[0].fields,
        from_fenced.table.records()[0].fields
    );
}

#[tokio::test]
async fn request_carries_model_settings_and_capped_text() {
    let mut model = ModelConfig::default();
    model.max_prompt_chars = 40;

    let backend = ScriptedBackend::new(vec![Ok(VALID_REPLY.to_string())]);
    let long_text = "Siemens service report ".repeat(20);
    analyze::analyze_text(&backend, &model, &long_text)
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.model, "gpt-3.5-turbo");
    assert_eq!(request.temperature, 0.1);
    assert_eq!(request.max_tokens, 2000);
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, "system");

    // Only the first 40 characters of the document text are embedded.
    let user = &request.messages[1].content;
    assert!(user.contains(&long_text[..40]));
    assert!(!user.contains(&long_text[..60]));
}

#[tokio::test]
async fn verify_credential_sends_minimal_request() {
    let backend = ScriptedBackend::new(vec![Ok("ok".to_string())]);
    let model = ModelConfig::default();
    analyze::verify_credential(&backend, &model).await.unwrap();

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[0].max_tokens, 5);
    assert_eq!(requests[0].messages.len(), 1);
}
