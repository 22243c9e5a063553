//! Invoice vs bank-transfer classification.

use tracing::debug;

use super::rules::{BankMatcher, RecipientRules};
use crate::models::{DocumentKind, RuleTables};

/// Signal that turned a document into a bank transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSignal {
    /// An explicit transfer phrase.
    Phrase(String),
    /// A bank name next to the word "comprobante".
    BankReceipt(String),
    /// A known recipient name fragment.
    KnownRecipient(String),
}

/// Keyword classifier. Best-effort: a wrong answer only changes the prompt.
#[derive(Debug, Clone)]
pub struct DocumentClassifier {
    transfer_phrases: Vec<String>,
    banks: BankMatcher,
    recipients: RecipientRules,
}

impl DocumentClassifier {
    pub fn new(tables: &RuleTables) -> Self {
        Self {
            transfer_phrases: tables
                .transfer_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            banks: BankMatcher::new(&tables.bank_names),
            recipients: RecipientRules::from_tables(tables),
        }
    }

    pub fn classify(&self, text: &str) -> DocumentKind {
        match self.transfer_signal(text) {
            Some(signal) => {
                debug!("Classified as bank transfer: {:?}", signal);
                DocumentKind::BankTransfer
            }
            None => {
                debug!("No transfer signal, classified as invoice");
                DocumentKind::Invoice
            }
        }
    }

    /// First transfer signal found in `text`, in priority order.
    pub fn transfer_signal(&self, text: &str) -> Option<TransferSignal> {
        let lowered = text.to_lowercase();

        if let Some(phrase) = self.transfer_phrases.iter().find(|p| lowered.contains(p.as_str())) {
            return Some(TransferSignal::Phrase(phrase.clone()));
        }

        if lowered.contains("comprobante") {
            if let Some(bank) = self.banks.mentioned(&lowered) {
                return Some(TransferSignal::BankReceipt(bank.to_string()));
            }
        }

        self.recipients
            .known_fragment(&lowered)
            .map(|r| TransferSignal::KnownRecipient(r.fragment.clone()))
    }
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new(&RuleTables::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_phrases() {
        let classifier = DocumentClassifier::default();

        assert_eq!(
            classifier.classify("COMPROBANTE DE TRANSFERENCIA Fecha 01/08/2024"),
            DocumentKind::BankTransfer
        );
        assert_eq!(
            classifier.transfer_signal("Importe debitado: 14691,00"),
            Some(TransferSignal::Phrase("importe debitado".to_string()))
        );
    }

    #[test]
    fn test_bank_with_comprobante() {
        let classifier = DocumentClassifier::default();

        assert_eq!(
            classifier.transfer_signal("Banco Galicia - Comprobante N 000123"),
            Some(TransferSignal::BankReceipt("galicia".to_string()))
        );
        // A bank name alone is not enough
        assert_eq!(classifier.classify("Pago con tarjeta Galicia"), DocumentKind::Invoice);
    }

    #[test]
    fn test_bank_inside_a_word_is_not_a_receipt() {
        let classifier = DocumentClassifier::default();

        assert_eq!(classifier.classify("Comprobante de donación N 12"), DocumentKind::Invoice);
        assert_eq!(classifier.classify("Macrobiótica Sur - Comprobante B"), DocumentKind::Invoice);
        assert_eq!(
            classifier.transfer_signal("Banco Nación comprobante 4411"),
            Some(TransferSignal::BankReceipt("nación".to_string()))
        );
    }

    #[test]
    fn test_known_recipient() {
        let classifier = DocumentClassifier::default();

        assert_eq!(
            classifier.transfer_signal("pago a CONS ED MISTICA calle 7"),
            Some(TransferSignal::KnownRecipient("cons ed mistica".to_string()))
        );
    }

    #[test]
    fn test_invoice() {
        let classifier = DocumentClassifier::default();

        assert_eq!(
            classifier.classify("CARREFOUR Fecha: 12/09/2024 Pan 250,00 TOTAL $4.532,40"),
            DocumentKind::Invoice
        );
        assert_eq!(classifier.classify(""), DocumentKind::Invoice);
    }
}
