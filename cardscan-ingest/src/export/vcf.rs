//! vCard (VCF 3.0) generation over a batch's outputs

use crate::export::has_name;
use crate::models::OutputRow;
use cardscan_common::record::{ContactRecord, NA};

/// Render all outputs of a batch as a VCF document.
///
/// One vCard per named record; phone-only rows never appear here since a
/// vCard without FN is useless to address books.
pub fn outputs_to_vcf(outputs: &[OutputRow]) -> String {
    let entries: Vec<String> = outputs
        .iter()
        .filter(|o| has_name(&o.record))
        .map(|o| vcf_entry(&o.record))
        .collect();
    entries.join("\n")
}

fn vcf_entry(record: &ContactRecord) -> String {
    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];

    let name = record.name.trim();
    lines.push(format!("FN:{}", name));
    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() >= 2 {
        lines.push(format!(
            "N:{};{};;;",
            parts[parts.len() - 1],
            parts[..parts.len() - 1].join(" ")
        ));
    } else {
        lines.push(format!("N:{};;;;", name));
    }

    for phone in record.phone_list() {
        if phone.len() == 10 {
            // Ten digits is a mobile number in the source region
            lines.push(format!("TEL;TYPE=CELL:+91{}", phone));
        } else if phone.len() > 10 {
            lines.push(format!("TEL;TYPE=WORK:{}", phone));
        } else {
            lines.push(format!("TEL:{}", phone));
        }
    }

    for email in record.email_list() {
        lines.push(format!("EMAIL:{}", email));
    }

    if record.company != NA && !record.company.is_empty() {
        lines.push(format!("ORG:{}", record.company));
    }
    if record.designation != NA && !record.designation.is_empty() {
        lines.push(format!("TITLE:{}", record.designation));
    }
    if record.address != NA && !record.address.is_empty() {
        lines.push(format!("ADR:;;{};;;;", record.address));
    }

    lines.push("END:VCARD".to_string());
    lines.join("\n")
}
