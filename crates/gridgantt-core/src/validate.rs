//! Schedule record validation
//!
//! Turns raw spreadsheet rows into a [`ScheduleModel`] in a single pass.
//! Every offending cell is collected before failing, so one error lists
//! everything that needs fixing in the export.
//!
//! Recovery paths that are not errors:
//! - rows whose `start` cell is empty are schedule-inactive placeholders and
//!   are dropped
//! - a missing, blank or non-integer `phase_number` leaves the package
//!   ungrouped
//! - optional columns that exist but hold no content at all are ignored

use crate::{
    Cell, InvalidValue, Record, RecordSet, ScheduleModel, ValidationError, WorkPackage,
    DURATION_RANGE, DURATION_REASON, START_RANGE, START_REASON,
};

pub const START_COLUMN: &str = "start";
pub const DURATION_COLUMN: &str = "duration";
pub const PHASE_COLUMN: &str = "phase_number";
pub const LABEL_COLUMN: &str = "label";

/// Columns that must be present in the input header
pub const MANDATORY_COLUMNS: [&str; 2] = [START_COLUMN, DURATION_COLUMN];

/// Validator for raw schedule records
#[derive(Clone, Debug)]
pub struct RecordValidator {
    /// Columns interpreted by the validator; all others pass through
    pub target_columns: Vec<String>,
    /// Subset of target columns whose absence aborts the load
    pub mandatory_columns: Vec<String>,
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self {
            target_columns: [START_COLUMN, DURATION_COLUMN, PHASE_COLUMN, LABEL_COLUMN]
                .into_iter()
                .map(String::from)
                .collect(),
            mandatory_columns: MANDATORY_COLUMNS.into_iter().map(String::from).collect(),
        }
    }
}

/// Validate records with the default column set
pub fn validate_records(records: &RecordSet) -> Result<ScheduleModel, ValidationError> {
    RecordValidator::new().validate(records)
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns from the target set that are usable in this input.
    ///
    /// Mandatory columns must exist. Optional columns are dropped when they
    /// are missing or entirely blank.
    pub fn usable_columns(&self, records: &RecordSet) -> Result<Vec<String>, ValidationError> {
        let mut usable = Vec::new();
        for column in &self.target_columns {
            let mandatory = self.mandatory_columns.contains(column);
            if !records.has_column(column) {
                if mandatory {
                    return Err(ValidationError::MissingColumn(column.clone()));
                }
                tracing::debug!(column = %column, "optional column is missing in the input");
                continue;
            }
            let has_content = records
                .rows()
                .iter()
                .any(|row| row.get(column).is_some_and(|c| !c.is_blank()));
            if !has_content && !mandatory {
                tracing::debug!(column = %column, "optional column is ignored, since it is empty");
                continue;
            }
            usable.push(column.clone());
        }
        Ok(usable)
    }

    /// Validate all rows and build the schedule model
    pub fn validate(&self, records: &RecordSet) -> Result<ScheduleModel, ValidationError> {
        // Header problems abort before any row is looked at.
        for column in &self.mandatory_columns {
            if !records.has_column(column) {
                return Err(ValidationError::MissingColumn(column.clone()));
            }
        }
        let usable = self.usable_columns(records)?;
        let use_phase = usable.iter().any(|c| c == PHASE_COLUMN);
        let use_label = usable.iter().any(|c| c == LABEL_COLUMN);

        let mut model = ScheduleModel::new();
        let mut issues = Vec::new();
        let mut dropped = 0usize;

        for (idx, record) in records.rows().iter().enumerate() {
            let row = idx + 1;
            let start_cell = cell(record, START_COLUMN);
            if start_cell.is_blank() {
                tracing::debug!(row, "row without start month is dropped");
                dropped += 1;
                continue;
            }

            let start = match start_cell.as_integer() {
                Some(v) if START_RANGE.contains(&v) => Some(v),
                _ => {
                    issues.push(InvalidValue::new(
                        Some(row),
                        START_COLUMN,
                        start_cell.to_string(),
                        START_REASON,
                    ));
                    None
                }
            };

            let duration_cell = cell(record, DURATION_COLUMN);
            let duration = match duration_cell.as_integer() {
                Some(v) if DURATION_RANGE.contains(&v) => Some(v),
                _ => {
                    issues.push(InvalidValue::new(
                        Some(row),
                        DURATION_COLUMN,
                        duration_cell.to_string(),
                        DURATION_REASON,
                    ));
                    None
                }
            };

            let (Some(start), Some(duration)) = (start, duration) else {
                continue;
            };
            if !issues.is_empty() {
                // Keep scanning for more issues, but stop building.
                continue;
            }

            let mut package = WorkPackage::new(start, duration)?;
            if use_phase {
                if let Some(number) = phase_number(record, row) {
                    package = package.phase(number);
                }
            }
            if use_label {
                let label = cell(record, LABEL_COLUMN);
                if !label.is_blank() {
                    package = package.label(label.to_string().trim());
                }
            }
            for (key, value) in record {
                if !self.target_columns.contains(key) {
                    package = package.attribute(key.clone(), value.clone());
                }
            }
            model.push_package(package);
        }

        if !issues.is_empty() {
            return Err(ValidationError::InvalidValues(issues));
        }

        tracing::debug!(
            packages = model.packages().len(),
            dropped,
            "validated schedule records"
        );
        Ok(model)
    }
}

static BLANK: Cell = Cell::Empty;

fn cell<'a>(record: &'a Record, column: &str) -> &'a Cell {
    record.get(column).unwrap_or(&BLANK)
}

/// Phase number of a row, if it is a well-formed positive integer
fn phase_number(record: &Record, row: usize) -> Option<u32> {
    let value = cell(record, PHASE_COLUMN);
    if value.is_blank() {
        return None;
    }
    let number = value
        .as_integer()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok());
    if number.is_none() {
        tracing::debug!(row, value = %value, "phase number is not a positive integer; package stays ungrouped");
    }
    number
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(start: &str, duration: &str) -> Vec<(&'static str, Cell)> {
        vec![("start", Cell::text(start)), ("duration", Cell::text(duration))]
    }

    #[test]
    fn usable_columns_skip_empty_optional() {
        let mut records = RecordSet::new(["start", "duration", "phase_number", "label"]);
        records.push_row([
            ("start", Cell::text("0")),
            ("duration", Cell::text("1")),
            ("phase_number", Cell::Empty),
            ("label", Cell::text("Kickoff")),
        ]);
        let usable = RecordValidator::new().usable_columns(&records).unwrap();
        assert_eq!(usable, vec!["start", "duration", "label"]);
    }

    #[test]
    fn missing_start_column() {
        let records = RecordSet::new(["duration"]);
        let err = validate_records(&records).unwrap_err();
        assert!(matches!(err, ValidationError::MissingColumn(ref c) if c == "start"));
    }

    #[test]
    fn blank_start_row_dropped() {
        let mut records = RecordSet::new(["start", "duration"]);
        records.push_row(row("0", "2"));
        records.push_row(row("", "5"));
        records.push_row(row("  ", "x"));
        records.push_row(row("3", "1"));

        let model = validate_records(&records).unwrap();
        let starts: Vec<_> = model.packages().iter().map(|p| p.start()).collect();
        assert_eq!(starts, vec![0, 3]);
    }

    #[test]
    fn all_issues_reported_together() {
        let mut records = RecordSet::new(["start", "duration"]);
        records.push_row(row("abc", "2"));
        records.push_row(row("1", "1"));
        records.push_row(row("2", "0"));
        records.push_row(row("-4", ""));

        let err = validate_records(&records).unwrap_err();
        let ValidationError::InvalidValues(issues) = err else {
            panic!("expected invalid values");
        };
        let located: Vec<_> = issues
            .iter()
            .map(|i| (i.row, i.column.as_str()))
            .collect();
        assert_eq!(
            located,
            vec![
                (Some(1), "start"),
                (Some(3), "duration"),
                (Some(4), "start"),
                (Some(4), "duration"),
            ]
        );
        assert_eq!(issues[0].value, "abc");
    }

    #[test]
    fn malformed_phase_degrades_to_ungrouped() {
        let mut records = RecordSet::new(["start", "duration", "phase_number"]);
        records.push_row([
            ("start", Cell::text("0")),
            ("duration", Cell::text("1")),
            ("phase_number", Cell::text("one")),
        ]);
        records.push_row([
            ("start", Cell::text("1")),
            ("duration", Cell::text("1")),
            ("phase_number", Cell::Float(2.0)),
        ]);
        records.push_row([
            ("start", Cell::text("1")),
            ("duration", Cell::text("1")),
            ("phase_number", Cell::Integer(-3)),
        ]);

        let model = validate_records(&records).unwrap();
        let phases: Vec<_> = model.packages().iter().map(|p| p.phase_number()).collect();
        assert_eq!(phases, vec![None, Some(2), None]);
    }

    #[test]
    fn passthrough_columns_preserved() {
        let mut records = RecordSet::new(["start", "duration", "owner", "label"]);
        records.push_row([
            ("start", Cell::text("2")),
            ("duration", Cell::text("3")),
            ("owner", Cell::text("Loreen")),
            ("label", Cell::text(" Design ")),
        ]);

        let model = validate_records(&records).unwrap();
        let package = &model.packages()[0];
        assert_eq!(package.display_label(), Some("Design"));
        assert_eq!(package.attributes().get("owner"), Some(&Cell::text("Loreen")));
        assert!(!package.attributes().contains_key("label"));
    }
}
