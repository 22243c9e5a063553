//! Corrections specific to bank transfer receipts.

use regex::Regex;
use rust_decimal::Decimal;

use super::patterns::collapse_whitespace;
use crate::models::MagnitudeCorrection;

/// Prefixes stripped before comparing a vendor with the bank table.
const BANK_PREFIXES: [&str; 3] = ["banco de la ", "banco del ", "banco "];

/// True when `vendor` names one of `bank_names`, with or without a leading "Banco".
pub fn is_bank_name(vendor: &str, bank_names: &[String]) -> bool {
    let vendor = collapse_whitespace(vendor).to_lowercase();
    if vendor.is_empty() {
        return false;
    }

    let bare = BANK_PREFIXES
        .iter()
        .find_map(|prefix| vendor.strip_prefix(prefix))
        .unwrap_or(&vendor);

    bank_names
        .iter()
        .map(|b| b.trim().to_lowercase())
        .any(|b| b == vendor || b == bare)
}

/// Finds bank names as whole words in free text.
#[derive(Debug, Clone)]
pub struct BankMatcher {
    patterns: Vec<(String, Regex)>,
}

impl BankMatcher {
    pub fn new(bank_names: &[String]) -> Self {
        let patterns = bank_names
            .iter()
            .map(|b| b.trim().to_lowercase())
            .filter(|b| !b.is_empty())
            .filter_map(|b| {
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&b))).ok()?;
                Some((b, pattern))
            })
            .collect();
        Self { patterns }
    }

    /// First bank mentioned in `text`, in table order.
    pub fn mentioned(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(name, _)| name.as_str())
    }
}

impl MagnitudeCorrection {
    /// Rescale a transfer total, returning `None` when no rule applies.
    ///
    /// Local bank slips print amounts whose separators OCR tends to drop or
    /// invent; the thresholds encode that heuristic and may misfire on
    /// legitimate amounts.
    pub fn correct(&self, total: Decimal) -> Option<Decimal> {
        if !self.enabled {
            return None;
        }

        let ten = Decimal::from(10);
        if total >= self.scale_up_from && total < self.scale_up_below {
            Some(total * ten)
        } else if total > self.scale_down_above {
            Some(total / ten)
        } else {
            None
        }
    }
}
