//! Document understanding: classification, prompting and normalization.

pub mod classifier;
pub mod normalizer;
pub mod prompt;
pub mod rules;

pub use classifier::{DocumentClassifier, TransferSignal};
pub use normalizer::{Normalized, ResponseNormalizer, strip_code_fences};
pub use prompt::{ExtractionPrompt, InlineImage, PromptBuilder, SYSTEM_INSTRUCTION};
