//! Core data models used throughout rapor.
//!
//! These types represent the extracted field records that flow from the
//! analysis pipeline into the session table, the spreadsheet export, and
//! the dashboard views.

use chrono::{DateTime, Local};

/// The machine-oriented JSON keys the model is instructed to return, paired
/// with the fixed human-readable column labels used for display and export.
///
/// The pairing is a bijection: every source key maps to exactly one label
/// and every label is mapped from exactly one key.
pub const FIELD_COLUMNS: [(&str, &str); 8] = [
    ("Restoration_Time", "Geri Yükleme Zamanı"),
    ("Work_Carried_Out", "Yapılan İşlemler"),
    ("Product_Number", "Ürün Numarası"),
    ("Customer_Company", "Müşteri Firma"),
    ("Customer_Location", "Müşteri Konumu"),
    ("Service_Engineer", "Servis Uzmanı"),
    ("Conclusion", "Sonuç"),
    ("EQ_No_End_Customer", "Ekipman No"),
];

/// Column label for the source file name.
pub const FILE_NAME_COLUMN: &str = "Dosya Adı";
/// Column label for the processing timestamp.
pub const PROCESSED_AT_COLUMN: &str = "İşlem Tarihi";

/// Timestamp format attached to every record ("2024-03-01 14:05:09").
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The fixed eight-field extraction result for one document.
///
/// Every field is independently optional; a field the model could not locate
/// is the empty string. Product number and equipment number are distinct
/// concepts and are never populated from the same source span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub restoration_time: String,
    pub work_carried_out: String,
    pub product_number: String,
    pub customer_company: String,
    pub customer_location: String,
    pub service_engineer: String,
    pub conclusion: String,
    pub equipment_number: String,
}

impl FieldSet {
    /// Field values in the fixed column order of [`FIELD_COLUMNS`].
    pub fn values(&self) -> [&str; 8] {
        [
            &self.restoration_time,
            &self.work_carried_out,
            &self.product_number,
            &self.customer_company,
            &self.customer_location,
            &self.service_engineer,
            &self.conclusion,
            &self.equipment_number,
        ]
    }
}

/// A [`FieldSet`] annotated with its source file name and processing time.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub fields: FieldSet,
    pub file_name: String,
    pub processed_at: DateTime<Local>,
}

impl ResultRecord {
    pub fn new(fields: FieldSet, file_name: impl Into<String>, at: DateTime<Local>) -> Self {
        Self {
            fields,
            file_name: file_name.into(),
            processed_at: at,
        }
    }

    /// Processing time in the fixed display format.
    pub fn processed_at_display(&self) -> String {
        self.processed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// The ordered, session-scoped collection of [`ResultRecord`]s.
///
/// Created empty at batch start, appended to during the batch, and replaced
/// wholesale in the session on the next run. Insertion order is a displayed
/// and exported property. Never persisted across restarts.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    records: Vec<ResultRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Pure append; records are never updated or removed.
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a document contributed nothing to the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The PDF could not be read, had no pages, or yielded no usable text.
    Unreadable,
    /// The model call failed or its reply could not be decoded.
    ModelFailure(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Unreadable => {
                write!(f, "could not be read (encrypted or image-only scan?)")
            }
            SkipReason::ModelFailure(e) => write!(f, "analysis failed: {}", e),
        }
    }
}

/// Per-document result of the batch fold.
#[derive(Debug, Clone)]
pub enum DocumentStatus {
    Analyzed,
    Skipped(SkipReason),
}

/// One entry in the batch outcome list, in input order.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub file_name: String,
    pub status: DocumentStatus,
}

/// The accumulated output of one batch run: the result table plus the
/// success/skip outcome of every input document.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub table: ResultTable,
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DocumentStatus::Analyzed))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Fraction of input documents that produced a record, as a percentage.
    /// Zero when the batch was empty.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.succeeded() as f64 * 100.0 / self.total() as f64
    }
}
