//! The canonical six-field contact record
//!
//! Every extraction result is normalized into this fixed shape. Absent fields
//! carry the sentinel value `"N/A"` rather than an empty string so that
//! acceptance filtering and export can treat "extracted as empty" and
//! "not extracted" identically, matching the upstream vision-model contract.

use serde::{Deserialize, Serialize};

/// Sentinel value for an absent field
pub const NA: &str = "N/A";

fn na() -> String {
    NA.to_string()
}

/// A single contact record extracted from a scanned document.
///
/// `phone` and `email` may hold several comma-separated values; the record is
/// still one logical contact. Splitting into per-number rows happens only at
/// export time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(default = "na")]
    pub name: String,
    #[serde(default = "na")]
    pub phone: String,
    #[serde(default = "na")]
    pub email: String,
    #[serde(default = "na")]
    pub company: String,
    #[serde(default = "na")]
    pub designation: String,
    #[serde(default = "na")]
    pub address: String,
}

impl Default for ContactRecord {
    fn default() -> Self {
        Self {
            name: na(),
            phone: na(),
            email: na(),
            company: na(),
            designation: na(),
            address: na(),
        }
    }
}

impl ContactRecord {
    /// Number of fields still holding the `"N/A"` sentinel (0..=6)
    pub fn na_count(&self) -> usize {
        [
            &self.name,
            &self.phone,
            &self.email,
            &self.company,
            &self.designation,
            &self.address,
        ]
        .iter()
        .filter(|f| f.as_str() == NA)
        .count()
    }

    /// Acceptance threshold: a record is kept only when at most 2 of its
    /// 6 fields are absent.
    pub fn is_acceptable(&self) -> bool {
        self.na_count() <= 2
    }

    /// Whether the record carries identifying data (name or company).
    ///
    /// Entries without either are phone-number continuations of the
    /// previous card, not independent contacts.
    pub fn has_identity(&self) -> bool {
        (!self.name.is_empty() && self.name != NA)
            || (!self.company.is_empty() && self.company != NA)
    }

    /// Deduplication key over the identifying fields (address excluded:
    /// the same contact is often extracted with and without it).
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.name, self.phone, self.email, self.company, self.designation
        )
    }

    /// Comma-separated phone values as a trimmed list; empty when absent.
    pub fn phone_list(&self) -> Vec<&str> {
        split_multi(&self.phone)
    }

    /// Comma-separated email values as a trimmed list; empty when absent.
    pub fn email_list(&self) -> Vec<&str> {
        split_multi(&self.email)
    }
}

fn split_multi(value: &str) -> Vec<&str> {
    if value.is_empty() || value == NA {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> ContactRecord {
        ContactRecord {
            name: "Jane Doe".into(),
            phone: "9876543210".into(),
            email: "jane@acme.example".into(),
            company: "Acme".into(),
            designation: "Director".into(),
            address: "1 Main St".into(),
        }
    }

    #[test]
    fn default_record_is_all_sentinel() {
        let record = ContactRecord::default();
        assert_eq!(record.na_count(), 6);
        assert!(!record.is_acceptable());
    }

    #[test]
    fn acceptance_allows_exactly_two_absent_fields() {
        let mut record = full_record();
        record.designation = NA.into();
        record.address = NA.into();
        assert_eq!(record.na_count(), 2);
        assert!(record.is_acceptable());
    }

    #[test]
    fn acceptance_rejects_three_absent_fields() {
        let record = ContactRecord {
            name: NA.into(),
            phone: NA.into(),
            email: "x@y.com".into(),
            company: "Acme".into(),
            designation: NA.into(),
            address: "1 Main St".into(),
        };
        assert_eq!(record.na_count(), 3);
        assert!(!record.is_acceptable());
    }

    #[test]
    fn identity_requires_name_or_company() {
        let mut record = ContactRecord::default();
        assert!(!record.has_identity());
        record.phone = "123456789".into();
        assert!(!record.has_identity());
        record.company = "Acme".into();
        assert!(record.has_identity());
    }

    #[test]
    fn multi_value_lists_split_and_trim() {
        let mut record = full_record();
        record.phone = "111, 222 ,333".into();
        assert_eq!(record.phone_list(), vec!["111", "222", "333"]);
        record.email = NA.into();
        assert!(record.email_list().is_empty());
    }

    #[test]
    fn missing_json_fields_default_to_sentinel() {
        let record: ContactRecord =
            serde_json::from_str(r#"{"name": "Jane Doe", "phone": "111"}"#).unwrap();
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.email, NA);
        assert_eq!(record.na_count(), 4);
    }
}
