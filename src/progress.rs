//! Batch progress reporting.
//!
//! Reports observable progress while a batch of reports is processed so the
//! operator sees which file is being worked on and how much is left.
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;

/// A single progress event for a batch run.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    /// Document `n` of `total` is being processed (extract + analyze).
    Processing {
        file_name: String,
        n: u64,
        total: u64,
    },
    /// The batch finished; `succeeded` of `total` documents produced a record.
    Finished { succeeded: u64, total: u64 },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait BatchProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the batch fold.
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "analyze  3 / 12  rapor_007.pdf".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Processing {
                file_name,
                n,
                total,
            } => {
                format!(
                    "analyze  {} / {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    file_name
                )
            }
            BatchProgressEvent::Finished { succeeded, total } => {
                format!(
                    "analyze  done  {} / {} documents analyzed\n",
                    format_number(*succeeded),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::Processing {
                file_name,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "file": file_name,
                "n": n,
                "total": total
            }),
            BatchProgressEvent::Finished { succeeded, total } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "succeeded": succeeded,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it into the batch fold.
    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
    }
}
