//! Export collaborators
//!
//! Read-only consumers of a batch's output queue. Row expansion happens
//! here, at export time, never at accept time: a record keeps its full
//! comma-separated phone/email values in the queue and is only split into
//! spreadsheet rows when a download is generated.

mod csv;
mod vcf;

pub use csv::outputs_to_csv;
pub use vcf::outputs_to_vcf;

use cardscan_common::record::{ContactRecord, NA};

/// Expand one record into export rows.
///
/// A record with a single phone value is one row. With several, the first
/// row is the full record carrying the first phone/email pair; every extra
/// phone gets its own row with the positionally matching email (empty when
/// exhausted) and all other fields blank.
pub fn expand_rows(record: &ContactRecord) -> Vec<ContactRecord> {
    let phones = record.phone_list();
    if phones.len() <= 1 {
        return vec![record.clone()];
    }
    let emails = record.email_list();

    let mut rows = Vec::with_capacity(phones.len());
    let mut primary = record.clone();
    primary.phone = phones[0].to_string();
    if let Some(first_email) = emails.first() {
        primary.email = first_email.to_string();
    }
    rows.push(primary);

    for (i, phone) in phones.iter().enumerate().skip(1) {
        rows.push(ContactRecord {
            name: String::new(),
            phone: phone.to_string(),
            email: emails.get(i).map(|e| e.to_string()).unwrap_or_default(),
            company: String::new(),
            designation: String::new(),
            address: String::new(),
        });
    }
    rows
}

/// Shared check: rows carrying only continuation phones have no name
pub(crate) fn has_name(record: &ContactRecord) -> bool {
    !record.name.is_empty() && record.name != NA
}
