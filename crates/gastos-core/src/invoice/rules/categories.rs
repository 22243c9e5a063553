//! Category resolution for invoices and transfer recipients.

use tracing::debug;

use crate::models::{Category, KeywordRule, KnownRecipient, RuleTables};

/// Resolve the model's invoice category, falling back to `default`.
pub fn invoice_category(raw: Option<&str>, default: Category) -> Category {
    raw.and_then(|label| Category::match_label(label, Category::INVOICE))
        .unwrap_or(default)
}

/// Why a transfer ended up in its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    KnownRecipient,
    Keyword,
    Model,
    Default,
}

/// Recipient-to-category rules for bank transfers.
#[derive(Debug, Clone)]
pub struct RecipientRules {
    known: Vec<KnownRecipient>,
    keywords: Vec<KeywordRule>,
    default: Category,
}

impl RecipientRules {
    pub fn new(known: Vec<KnownRecipient>, keywords: Vec<KeywordRule>, default: Category) -> Self {
        let known = known
            .into_iter()
            .map(|r| KnownRecipient {
                fragment: r.fragment.to_lowercase(),
                ..r
            })
            .collect();
        let keywords = keywords
            .into_iter()
            .map(|r| KeywordRule {
                keywords: r.keywords.iter().map(|k| k.to_lowercase()).collect(),
                ..r
            })
            .collect();

        Self {
            known,
            keywords,
            default,
        }
    }

    pub fn from_tables(tables: &RuleTables) -> Self {
        Self::new(
            tables.known_recipients.clone(),
            tables.recipient_keywords.clone(),
            tables.transfer_default,
        )
    }

    /// Known recipient fragment contained in `text`, if any.
    pub fn known_fragment(&self, text: &str) -> Option<&KnownRecipient> {
        let text = text.to_lowercase();
        self.known.iter().find(|r| text.contains(&r.fragment))
    }

    /// Pick the category of a transfer to `recipient`.
    ///
    /// Known recipients win, then keyword rules, then the model's own label if
    /// it belongs to the transfer vocabulary.
    pub fn categorize(&self, recipient: &str, model_label: Option<&str>) -> (Category, CategorySource) {
        if let Some(known) = self.known_fragment(recipient) {
            return (known.category, CategorySource::KnownRecipient);
        }

        let lowered = recipient.to_lowercase();
        if let Some(rule) = self
            .keywords
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k.as_str())))
        {
            debug!("Recipient {:?} matched keyword rule -> {}", recipient, rule.category);
            return (rule.category, CategorySource::Keyword);
        }

        match model_label.and_then(|label| Category::match_label(label, Category::TRANSFER)) {
            Some(category) => (category, CategorySource::Model),
            None => (self.default, CategorySource::Default),
        }
    }
}

impl Default for RecipientRules {
    fn default() -> Self {
        Self::from_tables(&RuleTables::default())
    }
}
