//! Vision-extraction collaborators
//!
//! The pipeline sees two capabilities, both black boxes behind traits: a
//! validator deciding whether a page is a business card at all, and an
//! extractor mapping a page image to zero or more raw field-sets. The shipped
//! implementation drives a Gemini-style generateContent API; tests substitute
//! stubs.

mod client;
mod parse;

pub use client::VisionClient;
pub use parse::{parse_extraction_response, parse_validation_response};

use crate::pages::PageImage;
use anyhow::Result;
use async_trait::async_trait;
use cardscan_common::ContactRecord;
use serde::Serialize;

/// Outcome of the document-validation capability
#[derive(Debug, Clone, Serialize)]
pub struct ValidationVerdict {
    pub is_acceptable: bool,
    /// High / Medium / Low, as reported by the model
    pub confidence: String,
    pub reasoning: String,
}

/// Maps one page image to zero or more raw field-sets.
///
/// May fail on transient upstream errors; the pipeline performs no retry or
/// backoff around this call.
#[async_trait]
pub trait CardExtractor: Send + Sync {
    async fn extract(&self, page: &PageImage) -> Result<Vec<ContactRecord>>;
}

/// Decides whether a page is an acceptable document for extraction
#[async_trait]
pub trait CardValidator: Send + Sync {
    async fn validate(&self, page: &PageImage) -> Result<ValidationVerdict>;
}
