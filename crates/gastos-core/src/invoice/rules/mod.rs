//! Rule-based normalization of model output.

pub mod amounts;
pub mod categories;
pub mod dates;
pub mod patterns;
pub mod transfer;

pub use amounts::{amount_from_json, parse_amount};
pub use categories::{CategorySource, RecipientRules, invoice_category};
pub use dates::{DateExtractor, DateFormat, DateWindow, parse_date, parse_wire_date, parse_wire_date_on};
pub use patterns::collapse_whitespace;
pub use transfer::{BankMatcher, is_bank_name};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}
