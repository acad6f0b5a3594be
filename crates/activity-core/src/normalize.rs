//! Text normaliser (spec §4.A).
//!
//! Produces the canonical string that the fingerprint hasher trigrams over.
//! The step ordering in §4.A is normative: whitespace collapse is detected
//! against the post-NFKD-lowercase form *before* category filtering removes
//! anything, and digit folding only ever sees what category filtering left
//! behind.

use unicode_categories::UnicodeCategories;
use unicode_normalization::UnicodeNormalization;

const VS16: char = '\u{FE0F}';
const ZWJ: char = '\u{200D}';
const ZWSP: char = '\u{200B}';

/// Canonicalise raw message text for hashing (spec §4.A).
pub fn normalize(raw: &str) -> String {
    // Step 1: NFKD decomposition, then simple (non-locale) lowercasing.
    let decomposed: String = raw.nfkd().collect::<String>().to_lowercase();

    let mut out = String::with_capacity(decomposed.len());
    let mut pending_space = false;
    for ch in decomposed.chars() {
        if ch.is_whitespace() {
            // Step 2: collapse any run of whitespace into one pending space.
            pending_space = true;
            continue;
        }
        if is_dropped(ch) {
            // Steps 3–5: combining marks, punctuation/symbol/control, and
            // the explicit VS16/ZWJ/ZWSP code points never reach the output,
            // but a whitespace run that precedes them is still honored.
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        // Step 6: fold every decimal digit to ascii '0'.
        if ch.is_ascii_digit() || ch.is_number_decimal_digit() {
            out.push('0');
        } else {
            out.push(ch);
        }
    }

    // Step 7: trim leading/trailing ascii space only.
    out.trim_matches(' ').to_string()
}

fn is_dropped(ch: char) -> bool {
    if ch == VS16 || ch == ZWJ || ch == ZWSP {
        return true;
    }
    ch.is_mark_nonspacing()
        || ch.is_mark_spacing_combining()
        || ch.is_punctuation()
        || ch.is_symbol()
        || ch.is_other()
}
