//! Pre-sync validation.
//!
//! Runs before any mutation; a failed validation aborts the cycle with
//! zero side effects. The report lists every offending row so the user can
//! fix them in one pass.

use crate::error::{DateOrderIssue, ValidationError};
use crate::model::Row;
use crate::schema::Schema;

/// Collect every row whose end date precedes its start date.
pub fn check_date_order(rows: &[Row], schema: &Schema) -> Vec<DateOrderIssue> {
    let mut issues = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let (start, end) = (schema.start(row), schema.end(row));
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                issues.push(DateOrderIssue {
                    // Absolute table row: header is row 1.
                    row: i + 2,
                    title: schema.title(row),
                    start,
                    end,
                });
            }
        }
    }
    issues
}

/// Fail with the full report when any row is invalid.
pub fn validate(rows: &[Row], schema: &Schema) -> Result<(), ValidationError> {
    let issues = check_date_order(rows, schema);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}
