mod summarizer;

pub use summarizer::{Summarizer, SummarizerConfig, FALLBACK_SUMMARY};
