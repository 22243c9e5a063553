//! Common regex patterns for normalizing model output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Whole-string date shapes, tried in this order
    pub static ref DATE_DMY_SLASH: Regex = Regex::new(
        r"^(\d{1,2})/(\d{1,2})/(\d{4})$"
    ).unwrap();

    pub static ref DATE_YMD_DASH: Regex = Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})$"
    ).unwrap();

    pub static ref DATE_DMY_DASH: Regex = Regex::new(
        r"^(\d{1,2})-(\d{1,2})-(\d{4})$"
    ).unwrap();

    pub static ref DATE_DMY_SHORT: Regex = Regex::new(
        r"^(\d{1,2})/(\d{1,2})/(\d{2})$"
    ).unwrap();

    // Date-shaped substring inside free text; ISO first so "2024-09-12" is not cut
    pub static ref DATE_FRAGMENT: Regex = Regex::new(
        r"\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}"
    ).unwrap();

    // Everything that cannot be part of an amount
    pub static ref AMOUNT_NOISE: Regex = Regex::new(
        r"[^\d,.]"
    ).unwrap();

    // Markdown code fences around model output
    pub static ref FENCE_OPEN: Regex = Regex::new(
        r"^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?"
    ).unwrap();

    pub static ref FENCE_CLOSE: Regex = Regex::new(
        r"\r?\n?[ \t]*```\s*$"
    ).unwrap();

    pub static ref WHITESPACE_RUN: Regex = Regex::new(
        r"\s+"
    ).unwrap();
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}
