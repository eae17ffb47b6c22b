//! Best-effort text extraction for service-report PDFs.
//!
//! Takes a PDF byte stream and returns plain UTF-8 text, or `None` when the
//! document yields nothing usable. Extraction is page-wise: a page that
//! fails to decode is skipped, partial text is acceptable. The concatenated
//! text gets a fixed Turkish mojibake correction pass before it is handed to
//! the field-extraction client.

use lopdf::Document;

/// Minimum number of non-whitespace characters for the extracted text to
/// count as usable. Below this the document is treated as textless
/// (encrypted or scanned-image PDFs typically land here).
const MIN_TEXT_CHARS: usize = 10;

/// Exact garbled byte sequences produced by UTF-8 Turkish letters decoded
/// through a single-byte code page, and the letters they stand for. This is
/// a heuristic patch for a known double-encoding artifact in the source
/// reports, not general transcoding: only these sequences are replaced,
/// no charset detection is attempted.
const TURKISH_MOJIBAKE: [(&str, &str); 12] = [
    ("Ä±", "ı"),
    ("Å\u{9f}", "ş"),
    ("Ä\u{9f}", "ğ"),
    ("Ã¼", "ü"),
    ("Ã¶", "ö"),
    ("Ã§", "ç"),
    ("Ä°", "İ"),
    ("Åž", "Ş"),
    ("ÄŸ", "Ğ"),
    ("Ãœ", "Ü"),
    ("Ã–", "Ö"),
    ("Ã‡", "Ç"),
];

/// Extract normalized text from a PDF byte stream.
///
/// Returns `None` when the document cannot be loaded, has zero pages, or the
/// concatenated page text contains fewer than [`MIN_TEXT_CHARS`]
/// non-whitespace characters after trimming. Pure function of the input
/// bytes.
pub fn extract_text(bytes: &[u8]) -> Option<String> {
    let doc = Document::load_mem(bytes).ok()?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return None;
    }

    let mut text = String::new();
    for &page_no in pages.keys() {
        // Per-page failures are swallowed; partial extraction is acceptable.
        match doc.extract_text(&[page_no]) {
            Ok(page_text) if !page_text.trim().is_empty() => text.push_str(&page_text),
            _ => continue,
        }
    }

    let non_ws = text.trim().chars().filter(|c| !c.is_whitespace()).count();
    if non_ws < MIN_TEXT_CHARS {
        return None;
    }

    Some(fix_turkish_mojibake(&text))
}

/// Replace the known garbled sequences with the Turkish letters they encode.
///
/// Idempotent: the replacement outputs never contain a garbled sequence, so
/// applying the pass twice yields the same result as applying it once.
pub fn fix_turkish_mojibake(text: &str) -> String {
    let mut fixed = text.to_string();
    for (garbled, letter) in TURKISH_MOJIBAKE {
        if fixed.contains(garbled) {
            fixed = fixed.replace(garbled, letter);
        }
    }
    fixed
}
