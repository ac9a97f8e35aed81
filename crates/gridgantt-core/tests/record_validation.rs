//! Validation of spreadsheet-like record sets

use gridgantt_core::{validate_records, Cell, Record, RecordSet, ValidationError};
use pretty_assertions::assert_eq;

fn record(cells: &[(&str, Cell)]) -> Record {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn realistic_export_with_placeholders() {
    // Mirrors a typical sheet: numeric cells, a trailing placeholder row,
    // a free-text column and integers exported as floats.
    let records = RecordSet::from_rows(vec![
        record(&[
            ("start", Cell::Integer(0)),
            ("duration", Cell::Integer(3)),
            ("phase_number", Cell::Integer(1)),
            ("owner", Cell::text("design team")),
        ]),
        record(&[
            ("start", Cell::Float(3.0)),
            ("duration", Cell::Float(6.0)),
            ("phase_number", Cell::Float(1.0)),
            ("owner", Cell::Empty),
        ]),
        record(&[
            ("start", Cell::Integer(6)),
            ("duration", Cell::Integer(14)),
            ("phase_number", Cell::Integer(2)),
        ]),
        record(&[
            ("start", Cell::Float(f64::NAN)),
            ("duration", Cell::Empty),
            ("phase_number", Cell::Empty),
        ]),
    ]);

    let model = validate_records(&records).unwrap();
    assert_eq!(model.packages().len(), 3);
    assert_eq!(model.project_start(), 0);
    assert_eq!(model.project_end(), 20);

    let phases = model.phases();
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].span(), (0, 9));
    assert_eq!(phases[1].span(), (6, 20));
    assert_eq!(
        model.packages()[0].attributes().get("owner"),
        Some(&Cell::text("design team"))
    );
}

#[test]
fn dropping_rows_leaves_other_columns_untouched() {
    let mut records = RecordSet::new(["start", "duration", "note"]);
    records.push_row([("start", Cell::text("")), ("duration", Cell::text("1")), ("note", Cell::text("skip"))]);
    records.push_row([("start", Cell::text("2")), ("duration", Cell::text("5")), ("note", Cell::text("keep"))]);

    let model = validate_records(&records).unwrap();
    assert_eq!(model.packages().len(), 1);
    let package = &model.packages()[0];
    assert_eq!((package.start(), package.duration(), package.end()), (2, 5, 7));
    assert_eq!(package.attributes().get("note"), Some(&Cell::text("keep")));
}

#[test]
fn zero_duration_fails_with_row_context() {
    let mut records = RecordSet::new(["start", "duration"]);
    records.push_row([("start", Cell::text("0")), ("duration", Cell::text("2"))]);
    records.push_row([("start", Cell::text("4")), ("duration", Cell::text("0"))]);

    let err = validate_records(&records).unwrap_err();
    assert!(err.to_string().contains("row 2, column 'duration'"));
    assert!(matches!(err, ValidationError::InvalidValues(ref v) if v.len() == 1));
}

#[test]
fn missing_duration_column_checked_before_rows() {
    let mut records = RecordSet::new(["start"]);
    records.push_row([("start", Cell::text("garbage"))]);

    let err = validate_records(&records).unwrap_err();
    assert!(matches!(err, ValidationError::MissingColumn(ref c) if c == "duration"));
}

#[test]
fn no_rows_gives_empty_model() {
    let records = RecordSet::new(["start", "duration"]);
    let model = validate_records(&records).unwrap();
    assert!(model.is_empty());
    assert!(!model.has_phases());
}

#[test]
fn oversized_months_are_invalid_values() {
    let mut records = RecordSet::new(["start", "duration"]);
    records.push_row([("start", Cell::text("9223372036854775807")), ("duration", Cell::text("1"))]);
    records.push_row([("start", Cell::text("5000000000")), ("duration", Cell::text("2"))]);
    records.push_row([("start", Cell::Integer(0)), ("duration", Cell::Float(1e12))]);
    records.push_row([("start", Cell::Integer(12_000)), ("duration", Cell::Integer(12_000))]);

    let values = match validate_records(&records).unwrap_err() {
        ValidationError::InvalidValues(values) => values,
        other => panic!("expected invalid values, got {other}"),
    };
    let located: Vec<(Option<usize>, &str)> =
        values.iter().map(|v| (v.row, v.column.as_str())).collect();
    assert_eq!(
        located,
        vec![(Some(1), "start"), (Some(2), "start"), (Some(3), "duration")]
    );
}
