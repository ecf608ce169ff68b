//! Parsing vision-model responses
//!
//! The model is asked for strict JSON but routinely wraps it in markdown
//! fences, leaks prose around it, returns a bare object instead of an array,
//! or emits unquoted N/A tokens. Extraction parsing repairs all of that
//! before deserializing; validation answers are parsed from labelled text.

use crate::pipeline::merge::clean_phone_field;
use crate::vision::ValidationVerdict;
use anyhow::{Context, Result};
use cardscan_common::ContactRecord;

/// Parse an extraction response into normalized records.
///
/// Missing fields default to the sentinel; phone fields are cleaned during
/// normalization so downstream merge logic sees digit-only values.
pub fn parse_extraction_response(text: &str) -> Result<Vec<ContactRecord>> {
    let cleaned = extract_json_payload(text);

    let mut records: Vec<ContactRecord> =
        serde_json::from_str(&cleaned).context("Vision response was not valid record JSON")?;

    for record in &mut records {
        record.phone = clean_phone_field(&record.phone);
    }
    Ok(records)
}

/// Strip markdown fences, isolate the JSON array (wrapping a bare object),
/// and quote bare N/A tokens.
fn extract_json_payload(text: &str) -> String {
    let mut payload = text.trim();

    if let Some(rest) = payload.strip_prefix("```json") {
        payload = rest;
    } else if let Some(rest) = payload.strip_prefix("```") {
        payload = rest;
    }
    if let Some(rest) = payload.strip_suffix("```") {
        payload = rest;
    }
    let payload = payload.trim();

    // Quote bare sentinel tokens the model sometimes emits
    let repaired = payload
        .replace(": N/A,", ": \"N/A\",")
        .replace(": N/A}", ": \"N/A\"}");

    // Isolate the array, or wrap a single object into one
    if let (Some(start), Some(end)) = (repaired.find('['), repaired.rfind(']')) {
        if start < end {
            return repaired[start..=end].to_string();
        }
    }
    if let (Some(start), Some(end)) = (repaired.find('{'), repaired.rfind('}')) {
        if start < end {
            return format!("[{}]", &repaired[start..=end]);
        }
    }
    repaired
}

/// Parse a validation response of the labelled form:
/// `Business Card: YES/NO`, `Confidence: High/Medium/Low`, `Reasoning: ...`
pub fn parse_validation_response(text: &str) -> ValidationVerdict {
    let upper = text.to_uppercase();
    let is_acceptable = upper.contains("YES") && text.contains("Business Card:");

    let confidence = if text.contains("Confidence: High") {
        "High"
    } else if text.contains("Confidence: Low") {
        "Low"
    } else {
        "Medium"
    };

    let reasoning = match text.find("Reasoning:") {
        Some(start) => {
            let tail = &text[start + "Reasoning:".len()..];
            match tail.find("Information Found:") {
                Some(end) => tail[..end].trim().to_string(),
                None => tail.trim().to_string(),
            }
        }
        None => "Unable to determine".to_string(),
    };

    ValidationVerdict {
        is_acceptable,
        confidence: confidence.to_string(),
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscan_common::record::NA;

    #[test]
    fn parses_fenced_json_array() {
        let response = "```json\n[{\"name\": \"Jane Doe\", \"phone\": \"+91 9876543210\", \"email\": \"jane@x.com\", \"company\": \"Acme\", \"designation\": \"Director\", \"address\": \"1 Main St\"}]\n```";
        let records = parse_extraction_response(response).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Jane Doe");
        assert_eq!(records[0].phone, "9876543210");
    }

    #[test]
    fn wraps_bare_object_into_array() {
        let response = "Here is the card:\n{\"name\": \"Jane Doe\", \"phone\": \"9876543210\"}";
        let records = parse_extraction_response(response).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email, NA);
    }

    #[test]
    fn repairs_unquoted_sentinels() {
        let response = "[{\"name\": \"Jane Doe\", \"phone\": N/A, \"email\": N/A}]";
        let records = parse_extraction_response(response).unwrap();
        assert_eq!(records[0].phone, NA);
        assert_eq!(records[0].email, NA);
    }

    #[test]
    fn multiple_cards_parse_to_multiple_records() {
        let response = r#"[
            {"name": "Jane Doe", "phone": "9876543210", "company": "Acme"},
            {"name": "John Roe", "phone": "9123456780", "company": "Beta"}
        ]"#;
        let records = parse_extraction_response(response).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "John Roe");
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(parse_extraction_response("sorry, I cannot help").is_err());
    }

    #[test]
    fn validation_yes_with_high_confidence() {
        let response = "Business Card: YES\nConfidence: High\nReasoning: Standard card layout\nInformation Found: name, phone";
        let verdict = parse_validation_response(response);
        assert!(verdict.is_acceptable);
        assert_eq!(verdict.confidence, "High");
        assert_eq!(verdict.reasoning, "Standard card layout");
    }

    #[test]
    fn validation_no_defaults_to_medium_confidence() {
        let response = "Business Card: NO\nReasoning: This is a restaurant menu";
        let verdict = parse_validation_response(response);
        assert!(!verdict.is_acceptable);
        assert_eq!(verdict.confidence, "Medium");
        assert_eq!(verdict.reasoning, "This is a restaurant menu");
    }
}
