//! HTTP client for the vision-extraction API
//!
//! Speaks a Gemini-style `generateContent` protocol: prompt text plus an
//! inline base64 image, JSON answer back. Requests are rate-limited
//! client-side; failures surface to the caller unretried.

use crate::pages::PageImage;
use crate::vision::{
    parse_extraction_response, parse_validation_response, CardExtractor, CardValidator,
    ValidationVerdict,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use cardscan_common::config::VisionConfig;
use cardscan_common::ContactRecord;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const EXTRACTION_PROMPT: &str = r#"You are an OCR system for business card data extraction. Analyze the image and extract ALL visible contact information.

The image may contain MULTIPLE business cards (side-by-side, stacked, or in a grid). Extract each card as its own JSON object, left-to-right, top-to-bottom.

For each card return exactly these keys:
- "name": person's name
- "phone": every phone number found, digits with country code as printed, comma-separated
- "email": every email address, comma-separated
- "company": business or organization name
- "designation": job title or role
- "address": full postal address

Scan margins, corners and fine print for phone numbers and emails; they are the most commonly missed fields. Use "N/A" for any field not present.

Respond with ONLY a JSON array of card objects, no commentary."#;

const VALIDATION_PROMPT: &str = r#"Analyze the uploaded image and determine if it is a business card.

A business card typically contains a person's name and job title, a company name, contact information and a professional layout in standard card dimensions.

Format your response as:
Business Card: [YES/NO]
Confidence: [High/Medium/Low]
Reasoning: [Your explanation]
Information Found: [List if applicable]"#;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for a generateContent-style vision model API
pub struct VisionClient {
    client: reqwest::Client,
    config: VisionConfig,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let rps = std::num::NonZeroU32::new(config.requests_per_second.max(1))
            .expect("non-zero after max(1)");
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(rps));

        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("cardscan/0.1.0")
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .context("Failed to build HTTP client")?,
            config,
            rate_limiter,
        })
    }

    async fn generate(&self, prompt: &str, page: &PageImage, max_tokens: u32) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("Vision API key not configured")?;

        // Rate limit API calls
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, api_key
        );

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": page.mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(&page.bytes),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "topP": 0.8,
                "topK": 40,
                "maxOutputTokens": max_tokens,
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Vision API request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Vision API returned error: {}", response.status());
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse vision API response")?;

        let text = parsed
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .context("Vision API response contained no text")?;

        debug!(chars = text.len(), "Vision API response received");
        Ok(text)
    }
}

#[async_trait]
impl CardExtractor for VisionClient {
    async fn extract(&self, page: &PageImage) -> Result<Vec<ContactRecord>> {
        let text = self.generate(EXTRACTION_PROMPT, page, 2048).await?;
        parse_extraction_response(&text)
    }
}

#[async_trait]
impl CardValidator for VisionClient {
    async fn validate(&self, page: &PageImage) -> Result<ValidationVerdict> {
        let text = self.generate(VALIDATION_PROMPT, page, 1024).await?;
        Ok(parse_validation_response(&text))
    }
}
