//! CSV generation over a batch's outputs

use crate::export::expand_rows;
use crate::models::OutputRow;
use std::collections::HashSet;
use tracing::debug;

const HEADERS: [&str; 7] = [
    "name",
    "phone",
    "email",
    "company",
    "designation",
    "address",
    "remarks",
];

/// Render all outputs of a batch as CSV text.
///
/// Records are deduplicated on their identifying fields before expansion, so
/// re-running a download never multiplies rows; the remarks column is left
/// empty for downstream annotation.
pub fn outputs_to_csv(outputs: &[OutputRow]) -> String {
    let mut csv = String::new();
    csv.push_str(&HEADERS.join(","));
    csv.push('\n');

    let mut written: HashSet<String> = HashSet::new();
    for output in outputs {
        if !written.insert(output.record.dedup_key()) {
            debug!(file_id = %output.file_id, "Skipping duplicate CSV record");
            continue;
        }
        for row in expand_rows(&output.record) {
            let fields = [
                row.name.as_str(),
                row.phone.as_str(),
                row.email.as_str(),
                row.company.as_str(),
                row.designation.as_str(),
                row.address.as_str(),
                "",
            ];
            let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
            csv.push_str(&line.join(","));
            csv.push('\n');
        }
    }
    csv
}

/// Quote a field when it carries a comma, quote or newline
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
