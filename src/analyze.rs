//! Field extraction via a chat-completion model.
//!
//! Builds the bilingual extraction prompt, sends a two-message exchange to an
//! OpenAI-compatible chat-completions endpoint, and decodes the JSON-shaped
//! reply into a [`FieldSet`]. Any transport error, non-success status, parse
//! failure, or missing key fails the whole call; a partial record is never
//! produced.
//!
//! The network side lives behind the [`ChatBackend`] trait so the batch
//! pipeline can run against a stub in tests. There is deliberately no retry
//! and no request timeout: a failure is surfaced immediately as a
//! per-document skip by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::models::FieldSet;

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// System message framing the assistant for the extraction exchange.
pub const SYSTEM_PROMPT: &str = "You are an expert assistant that analyzes Siemens service \
reports. You recognize Turkish and English section headings equally, you reply with JSON only, \
and you pay particular attention to the 'Sonuç / Conclusion' section.";

/// Errors from the field-extraction client.
#[derive(Debug)]
pub enum AnalyzeError {
    /// API credential missing from the environment or rejected.
    Credential(String),
    /// Failed to reach the completion endpoint.
    Connection(String),
    /// Endpoint returned a non-success status.
    Api(String),
    /// Reply was not the expected JSON shape.
    Parse(String),
}

impl std::fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzeError::Credential(msg) => write!(f, "credential error: {}", msg),
            AnalyzeError::Connection(msg) => write!(f, "connection error: {}", msg),
            AnalyzeError::Api(msg) => write!(f, "API error: {}", msg),
            AnalyzeError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for AnalyzeError {}

/// One message of the completion exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Wire format of a chat-completions request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat-completions response, reduced to the part we read.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Capability to invoke a chat-completion model.
///
/// The production implementation is [`OpenAiBackend`]; tests substitute a
/// stub that replays canned replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one completion request and return the assistant's reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, AnalyzeError>;
}

/// Chat backend speaking to an OpenAI-compatible HTTP endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Build a backend with the credential from [`API_KEY_ENV`].
    pub fn from_env(model: &ModelConfig) -> Result<Self, AnalyzeError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| AnalyzeError::Credential(format!("{} not set", API_KEY_ENV)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: model.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, AnalyzeError> {
        let url = format!("{}/chat/completions", self.api_base);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalyzeError::Connection(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalyzeError::Credential(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalyzeError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AnalyzeError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnalyzeError::Parse("empty choices array".to_string()))
    }
}

/// Analyze report text and return the extracted fields.
///
/// Constructs the bilingual instruction prompt (capping the embedded text at
/// `model.max_prompt_chars` characters), performs the two-message exchange,
/// strips an optional code fence from the reply, and strictly decodes the
/// eight-key JSON object. Truncation of the document text is logged, since
/// fields appearing beyond the cap will silently stay empty.
pub async fn analyze_text(
    backend: &dyn ChatBackend,
    model: &ModelConfig,
    text: &str,
) -> Result<FieldSet, AnalyzeError> {
    let (capped, truncated) = truncate_chars(text, model.max_prompt_chars);
    if truncated {
        warn!(
            cap = model.max_prompt_chars,
            "document text truncated before analysis; fields beyond the cap will not be found"
        );
    }

    let request = ChatRequest {
        model: model.name.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(capped)),
        ],
        temperature: model.temperature,
        max_tokens: model.max_output_tokens,
    };

    debug!(model = %model.name, chars = capped.chars().count(), "requesting field extraction");
    let reply = backend.complete(&request).await?;
    decode_reply(&reply)
}

/// Prove the credential works with a minimal completion call.
///
/// Credential absence or rejection is fatal to the whole session; the caller
/// surfaces it once and blocks any processing.
pub async fn verify_credential(
    backend: &dyn ChatBackend,
    model: &ModelConfig,
) -> Result<(), AnalyzeError> {
    let request = ChatRequest {
        model: model.name.clone(),
        messages: vec![ChatMessage::user("Test")],
        temperature: model.temperature,
        max_tokens: 5,
    };
    backend.complete(&request).await.map(|_| ())
}

/// The user instruction: all eight target fields with their accepted heading
/// variants in both languages, the output schema, and the formatting rules.
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"Below is the text of a Siemens-format service report. Extract the fields listed in the schema. Reports may carry Turkish or English headings; the comment next to each field lists its accepted heading variants. If none of the variants occurs, leave that field as an empty string ("").

Respond with JSON matching this schema exactly:

{{
  "Restoration_Time": "",        // "Restoration Time", "Rapor hazırlanma zamanı", "Ticket reporting time", "Date", "Tarih", "Time", "Zaman"
  "Work_Carried_Out": "",        // "Yapılan işlemler", "Work carried out", "İş tanımı", "Job Description", "Programa online", "İşlem"
  "Product_Number": "",          // "Product No:", "Product Number", "Ürün No", "Model", "Part Number", "Article Number" (the product MODEL number)
  "Customer_Company": "",        // "Firma", "Company", "Name", "Customer", "Müşteri", "End Customer"
  "Customer_Location": "",       // "Konum", "Location", "ZIP Code", "Address", "Adres", "Şehir"
  "Service_Engineer": "",        // "Servis Uzmanı", "Service Engineer", "Teknisyen", "Technician", "Engineer"
  "Conclusion": "",              // "Conclusion", "Sonuç", "Result", "Netice", "Summary"
  "EQ_No_End_Customer": ""       // "EQ No", "Equipment No", "Ekipman No", "EQ No. End Customer" (the EQUIPMENT number, if present)
}}

Report text:
------------------------------------------------------
{text}
------------------------------------------------------

Rules:
1. Extract the full text under any "Sonuç / Conclusion" heading; do not skip it.
2. Normalize dates to dd/mm/yyyy.
3. Summarize long passages but keep the important details.
4. Respond with JSON only, no explanations and no surrounding prose.
5. Treat Turkish and English headings identically.
6. Product_Number (product model number) and EQ_No_End_Customer (equipment number) are DIFFERENT values; never fill one from the other.
7. Recognize and output Turkish characters (ç, ğ, ı, ö, ş, ü) correctly."#
    )
}

/// Raw reply record with the machine-oriented keys the model returns.
/// All eight keys are required; extra keys are ignored.
#[derive(Debug, Deserialize)]
struct RawFieldSet {
    #[serde(rename = "Restoration_Time")]
    restoration_time: String,
    #[serde(rename = "Work_Carried_Out")]
    work_carried_out: String,
    #[serde(rename = "Product_Number")]
    product_number: String,
    #[serde(rename = "Customer_Company")]
    customer_company: String,
    #[serde(rename = "Customer_Location")]
    customer_location: String,
    #[serde(rename = "Service_Engineer")]
    service_engineer: String,
    #[serde(rename = "Conclusion")]
    conclusion: String,
    #[serde(rename = "EQ_No_End_Customer")]
    equipment_number: String,
}

impl From<RawFieldSet> for FieldSet {
    fn from(raw: RawFieldSet) -> Self {
        FieldSet {
            restoration_time: raw.restoration_time,
            work_carried_out: raw.work_carried_out,
            product_number: raw.product_number,
            customer_company: raw.customer_company,
            customer_location: raw.customer_location,
            service_engineer: raw.service_engineer,
            conclusion: raw.conclusion,
            equipment_number: raw.equipment_number,
        }
    }
}

/// Strictly decode a model reply into a [`FieldSet`].
///
/// Strips an optional fenced code block first (a block tagged `json` wins
/// over a plain fence). A reply that fails JSON parsing or lacks any of the
/// eight keys yields an error, never a partial record.
pub fn decode_reply(reply: &str) -> Result<FieldSet, AnalyzeError> {
    let body = strip_code_fence(reply);
    let raw: RawFieldSet =
        serde_json::from_str(body).map_err(|e| AnalyzeError::Parse(e.to_string()))?;
    Ok(raw.into())
}

/// Remove a Markdown code fence wrapping the reply, if present.
fn strip_code_fence(reply: &str) -> &str {
    if let Some(start) = reply.find("```json") {
        let rest = &reply[start + "```json".len()..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }
    if let Some(start) = reply.find("```") {
        let rest = &reply[start + "```".len()..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }
    reply.trim()
}

/// Cap text at `max_chars` characters on a UTF-8 boundary.
/// Returns the capped slice and whether anything was cut.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
