//! Merging fragmented extraction results into complete records
//!
//! The vision model returns one field-set per card it sees on a page. Two
//! kinds of fragmentation have to be repaired before a record is usable:
//! multi-page documents (front/back scans, PDFs) split one contact across
//! pages, and a single page can carry stray phone-only entries that belong to
//! the card above them.

use cardscan_common::record::{ContactRecord, NA};

/// Combine per-page field-sets into one complete record.
///
/// Zero pages yield nothing; a single page passes through unchanged. Across
/// pages: name, designation and address take the first non-sentinel value;
/// phone and email become an order-preserving deduplicated union of their
/// comma-separated sub-values; company takes the longest non-sentinel value,
/// since truncated page crops tend to lose the legal suffix.
pub fn combine_pages(pages: Vec<ContactRecord>) -> Vec<ContactRecord> {
    if pages.is_empty() {
        return Vec::new();
    }
    if pages.len() == 1 {
        return pages;
    }

    let mut merged = ContactRecord::default();
    let mut phones: Vec<String> = Vec::new();
    let mut emails: Vec<String> = Vec::new();
    let mut companies: Vec<String> = Vec::new();

    for page in &pages {
        if merged.name == NA && page.name != NA {
            merged.name = page.name.clone();
        }
        for phone in page.phone_list() {
            push_unique(&mut phones, phone);
        }
        for email in page.email_list() {
            push_unique(&mut emails, email);
        }
        if page.company != NA {
            companies.push(page.company.clone());
        }
        if merged.designation == NA && page.designation != NA {
            merged.designation = page.designation.clone();
        }
        if merged.address == NA && page.address != NA {
            merged.address = page.address.clone();
        }
    }

    if !phones.is_empty() {
        merged.phone = phones.join(",");
    }
    if !emails.is_empty() {
        merged.email = emails.join(",");
    }
    if let Some(longest) = companies.into_iter().max_by_key(String::len) {
        merged.company = longest;
    }

    vec![merged]
}

/// Consolidate one page's field-sets into independent cards.
///
/// An entry lacking both name and company is a continuation of the most
/// recent entry that had identity data: its phone numbers are comma-appended
/// to that owner instead of becoming a record of their own. A continuation
/// run ends at the next entry bearing identity data or at the end of the
/// list. Continuations before any owner are dropped.
pub fn consolidate_cards(entries: Vec<ContactRecord>) -> Vec<ContactRecord> {
    let mut cards: Vec<ContactRecord> = Vec::new();

    for entry in entries {
        if entry.has_identity() {
            cards.push(entry);
        } else if let Some(owner) = cards.last_mut() {
            if entry.phone != NA && !entry.phone.is_empty() {
                if owner.phone == NA || owner.phone.is_empty() {
                    owner.phone = entry.phone;
                } else {
                    let mut phones: Vec<String> =
                        owner.phone_list().iter().map(|p| p.to_string()).collect();
                    for phone in entry.phone_list() {
                        push_unique(&mut phones, phone);
                    }
                    owner.phone = phones.join(",");
                }
            }
        }
    }

    cards
}

/// Normalize a comma-separated phone field.
///
/// Per part: digits only, "91" country prefix stripped when it pushes the
/// number past 10 digits, then kept only in the 8..=12 digit range (landline
/// through STD-code lengths). Duplicates removed preserving order. Everything
/// filtered out collapses back to the sentinel.
pub fn clean_phone_field(phone: &str) -> String {
    if phone.is_empty() || phone == NA {
        return NA.to_string();
    }

    let mut phones: Vec<String> = Vec::new();
    for part in phone.split(',') {
        let mut digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() > 10 && digits.starts_with("91") {
            digits = digits[2..].to_string();
        }
        if (8..=12).contains(&digits.len()) && !phones.contains(&digits) {
            phones.push(digits);
        }
    }

    if phones.is_empty() {
        NA.to_string()
    } else {
        phones.join(",")
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str, phone: &str, email: &str, company: &str) -> ContactRecord {
        ContactRecord {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            company: company.into(),
            designation: NA.into(),
            address: NA.into(),
        }
    }

    #[test]
    fn combine_empty_input_yields_nothing() {
        assert!(combine_pages(Vec::new()).is_empty());
    }

    #[test]
    fn combine_single_page_passes_through_unchanged() {
        let original = page("Jane Doe", "111", "jane@x.com", "Acme");
        let combined = combine_pages(vec![original.clone()]);
        assert_eq!(combined, vec![original]);
    }

    #[test]
    fn combine_unions_phones_preserving_order() {
        let front = page("Jane Doe", "111,222", NA, NA);
        let back = page(NA, "222,333", NA, NA);
        let combined = combine_pages(vec![front, back]);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].phone, "111,222,333");
        assert_eq!(combined[0].name, "Jane Doe");
    }

    #[test]
    fn combine_takes_first_name_and_longest_company() {
        let first = page(NA, NA, NA, "Acme");
        let second = page("Jane Doe", NA, NA, "Acme Industries Pvt. Ltd.");
        let third = page("Someone Else", NA, NA, "Acme Ind");
        let combined = combine_pages(vec![first, second, third]);
        assert_eq!(combined[0].name, "Jane Doe");
        assert_eq!(combined[0].company, "Acme Industries Pvt. Ltd.");
    }

    #[test]
    fn combine_unions_emails_and_keeps_first_address() {
        let mut front = page("Jane Doe", NA, "a@x.com", NA);
        front.address = "1 Main St".into();
        let mut back = page(NA, NA, "a@x.com,b@x.com", NA);
        back.address = "2 Side St".into();
        let combined = combine_pages(vec![front, back]);
        assert_eq!(combined[0].email, "a@x.com,b@x.com");
        assert_eq!(combined[0].address, "1 Main St");
    }

    #[test]
    fn consolidate_appends_continuation_phones_to_owner() {
        let owner = page("Jane Doe", "111", "jane@x.com", "Acme");
        let continuation = page(NA, "222", NA, NA);
        let second_continuation = page(NA, "333", NA, NA);
        let cards = consolidate_cards(vec![owner, continuation, second_continuation]);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].phone, "111,222,333");
    }

    #[test]
    fn consolidate_run_ends_at_next_identity_entry() {
        let first = page("Jane Doe", "111", NA, NA);
        let stray = page(NA, "222", NA, NA);
        let second = page(NA, "333", NA, "Beta Corp");
        let trailing = page(NA, "444", NA, NA);
        let cards = consolidate_cards(vec![first, stray, second, trailing]);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].phone, "111,222");
        assert_eq!(cards[1].phone, "333,444");
    }

    #[test]
    fn consolidate_drops_leading_orphans() {
        let orphan = page(NA, "999", NA, NA);
        let owner = page("Jane Doe", "111", NA, NA);
        let cards = consolidate_cards(vec![orphan, owner]);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].phone, "111");
    }

    #[test]
    fn consolidate_fills_empty_owner_phone() {
        let owner = page("Jane Doe", NA, NA, NA);
        let continuation = page(NA, "222", NA, NA);
        let cards = consolidate_cards(vec![owner, continuation]);
        assert_eq!(cards[0].phone, "222");
    }

    #[test]
    fn clean_phone_strips_formatting_and_country_prefix() {
        assert_eq!(clean_phone_field("+91 98765-43210"), "9876543210");
        assert_eq!(clean_phone_field("(011) 2345 6789"), "01123456789");
        assert_eq!(
            clean_phone_field("9876543210, 98765 43210, 1234567"),
            "9876543210"
        );
        assert_eq!(clean_phone_field("N/A"), "N/A");
        assert_eq!(clean_phone_field("call me"), "N/A");
    }
}
