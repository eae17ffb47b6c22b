//! Descriptive analytics over the session's result table.
//!
//! Everything here is a read-only view computed from the table already in
//! memory: summary counts, per-column frequency tables, a fixed keyword
//! bucketing of the free-text "work carried out" field, and a monthly trend
//! over parseable restoration dates. Empty or absent columns produce empty
//! views, never errors.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{FieldSet, ResultTable};
use crate::session::Session;

/// Customers shown in the frequency view.
pub const TOP_CUSTOMERS: usize = 10;
/// Locations shown in the frequency view.
pub const TOP_LOCATIONS: usize = 15;

/// Date formats accepted for the trend view. The prompt asks the model for
/// `dd/mm/yyyy`, so that comes first; ISO and dotted Turkish dates cover
/// replies that echo the report verbatim.
const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub records: usize,
    pub unique_customers: usize,
    pub unique_engineers: usize,
    pub unique_locations: usize,
}

/// Compute the headline numbers: record count plus distinct non-empty
/// values per categorical column.
pub fn summary(table: &ResultTable) -> Summary {
    Summary {
        records: table.len(),
        unique_customers: distinct_count(table, |f| &f.customer_company),
        unique_engineers: distinct_count(table, |f| &f.service_engineer),
        unique_locations: distinct_count(table, |f| &f.customer_location),
    }
}

fn distinct_count<F>(table: &ResultTable, accessor: F) -> usize
where
    F: Fn(&FieldSet) -> &str,
{
    table
        .records()
        .iter()
        .map(|r| accessor(&r.fields))
        .filter(|v| !v.trim().is_empty())
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// Frequency of non-empty values of one column, count-descending with a
/// stable name tiebreak.
pub fn frequency_by<F>(table: &ResultTable, accessor: F) -> Vec<(String, usize)>
where
    F: Fn(&FieldSet) -> &str,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in table.records() {
        let value = accessor(&record.fields).trim();
        if value.is_empty() {
            continue;
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut result: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    // BTreeMap iteration already sorted by name; stable sort keeps that as
    // the tiebreak within equal counts.
    result.sort_by(|a, b| b.1.cmp(&a.1));
    result
}

/// The six fixed buckets for the "work carried out" field, in match
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkCategory {
    Test,
    Maintenance,
    Repair,
    Installation,
    Check,
    Other,
}

impl WorkCategory {
    /// All buckets in priority order.
    pub const ALL: [WorkCategory; 6] = [
        WorkCategory::Test,
        WorkCategory::Maintenance,
        WorkCategory::Repair,
        WorkCategory::Installation,
        WorkCategory::Check,
        WorkCategory::Other,
    ];

    /// Position in the fixed priority order.
    fn priority(&self) -> usize {
        match self {
            WorkCategory::Test => 0,
            WorkCategory::Maintenance => 1,
            WorkCategory::Repair => 2,
            WorkCategory::Installation => 3,
            WorkCategory::Check => 4,
            WorkCategory::Other => 5,
        }
    }

    /// Display label (the export/dashboard contract is Turkish).
    pub fn label(&self) -> &'static str {
        match self {
            WorkCategory::Test => "Test İşlemleri",
            WorkCategory::Maintenance => "Bakım İşlemleri",
            WorkCategory::Repair => "Onarım İşlemleri",
            WorkCategory::Installation => "Kurulum İşlemleri",
            WorkCategory::Check => "Kontrol İşlemleri",
            WorkCategory::Other => "Diğer İşlemler",
        }
    }
}

impl std::fmt::Display for WorkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify one "work carried out" description into its bucket.
///
/// Case-insensitive substring match against Turkish and English keywords,
/// in the fixed priority order of [`WorkCategory::ALL`]; the first matching
/// bucket wins, everything else falls through to `Other`. Total and
/// deterministic over non-empty input.
pub fn classify_work(work: &str) -> WorkCategory {
    let lower = work.to_lowercase();
    if lower.contains("test") {
        WorkCategory::Test
    } else if lower.contains("bakım") || lower.contains("maintenance") {
        WorkCategory::Maintenance
    } else if lower.contains("onarım") || lower.contains("repair") {
        WorkCategory::Repair
    } else if lower.contains("kurulum") || lower.contains("installation") {
        WorkCategory::Installation
    } else if lower.contains("kontrol") || lower.contains("check") {
        WorkCategory::Check
    } else {
        WorkCategory::Other
    }
}

/// Bucket counts over all records with a non-empty "work carried out"
/// field, in priority order, zero buckets omitted.
pub fn work_type_counts(table: &ResultTable) -> Vec<(WorkCategory, usize)> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for record in table.records() {
        let work = record.fields.work_carried_out.trim();
        if work.is_empty() {
            continue;
        }
        let category = classify_work(work);
        *counts.entry(category.priority()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(slot, count)| (WorkCategory::ALL[slot], count))
        .collect()
}

/// Month-bucketed record counts over parseable restoration dates,
/// chronologically ordered as `YYYY-MM`. Records whose restoration time
/// does not parse are dropped from this view only, never from the table.
pub fn monthly_trend(table: &ResultTable) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in table.records() {
        if let Some(date) = parse_report_date(&record.fields.restoration_time) {
            *counts.entry(date.format("%Y-%m").to_string()).or_insert(0) += 1;
        }
    }
    counts.into_iter().collect()
}

/// Parse a restoration-time value under the known formats.
pub fn parse_report_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    None
}

/// Render the full dashboard for the current session to stdout.
pub fn run_dashboard(session: &Session) {
    if !session.has_data() {
        println!("No analyzed data yet. Run `rapor analyze` first.");
        return;
    }

    let table = session.table();
    let summary = summary(table);

    println!("rapor — Analysis Dashboard");
    println!("==========================");
    println!();
    println!("  Records:             {}", summary.records);
    println!("  Unique customers:    {}", summary.unique_customers);
    println!("  Service engineers:   {}", summary.unique_engineers);
    println!("  Distinct locations:  {}", summary.unique_locations);

    let customers = frequency_by(table, |f| &f.customer_company);
    print_frequency("Top customers", &customers, Some(TOP_CUSTOMERS));

    let engineers = frequency_by(table, |f| &f.service_engineer);
    print_frequency("Engineer workload", &engineers, None);

    let work = work_type_counts(table);
    if !work.is_empty() {
        println!();
        println!("  Work categories:");
        println!("  {:<24} {:>6}", "CATEGORY", "JOBS");
        println!("  {}", "-".repeat(32));
        for (category, count) in &work {
            println!("  {:<24} {:>6}", category.label(), count);
        }
    }

    let trend = monthly_trend(table);
    if !trend.is_empty() {
        println!();
        println!("  Monthly trend:");
        println!("  {:<10} {:>6}", "MONTH", "JOBS");
        println!("  {}", "-".repeat(18));
        for (month, count) in &trend {
            println!("  {:<10} {:>6}", month, count);
        }
    }

    let locations = frequency_by(table, |f| &f.customer_location);
    print_frequency("Service locations", &locations, Some(TOP_LOCATIONS));

    println!();
}

fn print_frequency(title: &str, rows: &[(String, usize)], limit: Option<usize>) {
    if rows.is_empty() {
        return;
    }
    let shown = limit.unwrap_or(rows.len()).min(rows.len());
    println!();
    match limit {
        Some(n) if rows.len() > n => println!("  {} (top {}):", title, n),
        _ => println!("  {}:", title),
    }
    println!("  {:<32} {:>6}", "NAME", "JOBS");
    println!("  {}", "-".repeat(40));
    for (name, count) in &rows[..shown] {
        println!("  {:<32} {:>6}", name, count);
    }
}
