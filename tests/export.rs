use chrono::NaiveDate;
use csv::ReaderBuilder;
use field_mapper::{
    error::ExportError,
    export::{ExportFormat, ExportRequest, export},
    extract::{CanonicalRow, extract},
    mapping::{InitialMapping, MappingSession, TargetField},
    value::Cell,
};
use serde_json::{Value, json};

fn session_for(labels: &[(&str, Option<&str>)], headers: &[String]) -> MappingSession {
    let initial = labels
        .iter()
        .map(|(label, source)| InitialMapping {
            label: label.to_string(),
            source_api_field: source.map(str::to_string),
        })
        .collect::<Vec<_>>();
    MappingSession::bootstrap(&initial, headers.to_vec())
}

fn request(format: ExportFormat) -> ExportRequest {
    ExportRequest {
        format,
        table_name: Some("Visits".to_string()),
        date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    }
}

fn ab_rows() -> (Vec<TargetField>, Vec<CanonicalRow>) {
    let extraction = extract(&json!([{"A": "x,y", "B": "z"}]));
    let session = session_for(&[("A", Some("A")), ("B", Some("B"))], &extraction.headers);
    (session.targets().to_vec(), extraction.rows)
}

#[test]
fn csv_export_is_exact_and_parses_back() {
    let (targets, rows) = ab_rows();
    let file = export(&targets, &rows, &request(ExportFormat::Csv)).unwrap();
    let text = String::from_utf8(file.bytes).unwrap();
    assert_eq!(text, "A,B\r\n\"x,y\",z");
    assert_eq!(file.filename, "visits_20240131.csv");
    assert_eq!(file.content_type, "text/csv;charset=utf-8");

    let mut reader = ReaderBuilder::new().from_reader(text.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["A", "B"]);
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(record.iter().collect::<Vec<_>>(), vec!["x,y", "z"]);
}

#[test]
fn columns_follow_target_order_not_source_order() {
    let extraction = extract(&json!([{"first": 1, "second": 2}]));
    let session = session_for(
        &[("Second", Some("second")), ("First", Some("first"))],
        &extraction.headers,
    );
    let file = export(session.targets(), &extraction.rows, &request(ExportFormat::Csv)).unwrap();
    assert_eq!(String::from_utf8(file.bytes).unwrap(), "Second,First\r\n2,1");
}

#[test]
fn sql_export_escapes_quotes_and_nulls() {
    let extraction = extract(&json!([{"name": "O'Brien", "age": 41}]));
    let session = session_for(
        &[("Name", Some("name")), ("Age", Some("age"))],
        &extraction.headers,
    );
    let file = export(session.targets(), &extraction.rows, &request(ExportFormat::Sql)).unwrap();
    assert_eq!(
        String::from_utf8(file.bytes).unwrap(),
        "INSERT INTO `visits` (`Name`, `Age`) VALUES ('O''Brien', 41);"
    );
    assert_eq!(Cell::Null.to_sql_literal(), "NULL");
}

#[test]
fn json_export_is_pretty_and_ordered() {
    let extraction = extract(&json!([{"a": 1, "b": true}, {"a": 2}]));
    let session = session_for(&[("B", Some("b")), ("A", Some("a"))], &extraction.headers);
    let file = export(session.targets(), &extraction.rows, &request(ExportFormat::Json)).unwrap();
    let text = String::from_utf8(file.bytes).unwrap();
    assert!(text.starts_with("[\n  {\n    \"B\": true,\n    \"A\": 1\n  }"));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json!([{"B": true, "A": 1}, {"B": "", "A": 2}]));
}

#[test]
fn xlsx_export_produces_a_workbook() {
    let (targets, rows) = ab_rows();
    let file = export(&targets, &rows, &request(ExportFormat::Xlsx)).unwrap();
    assert_eq!(file.filename, "visits_20240131.xlsx");
    assert!(file.bytes.starts_with(b"PK"));
}

#[test]
fn missing_targets_are_an_error() {
    let (_, rows) = ab_rows();
    let err = export(&[], &rows, &request(ExportFormat::Csv)).unwrap_err();
    assert!(matches!(err, ExportError::NoTargetFields));
    assert!(!err.is_informational());
}

#[test]
fn missing_rows_are_informational() {
    let (targets, _) = ab_rows();
    let err = export(&targets, &[], &request(ExportFormat::Csv)).unwrap_err();
    assert!(matches!(err, ExportError::NoRows));
    assert!(err.is_informational());
}

#[test]
fn missing_table_name_falls_back() {
    let (targets, rows) = ab_rows();
    let mut req = request(ExportFormat::Sql);
    req.table_name = None;
    let file = export(&targets, &rows, &req).unwrap();
    assert_eq!(file.filename, "exported_data_20240131.sql");
    assert!(
        String::from_utf8(file.bytes)
            .unwrap()
            .starts_with("INSERT INTO `exported_data`")
    );
}

#[test]
fn blank_single_column_rows_stay_unquoted() {
    let extraction = extract(&json!([{"a": "x"}, {"b": 1}]));
    let session = session_for(&[("A", Some("a"))], &extraction.headers);
    let file = export(session.targets(), &extraction.rows, &request(ExportFormat::Csv)).unwrap();
    assert_eq!(String::from_utf8(file.bytes).unwrap(), "A\r\nx\r\n");

    let extraction = extract(&json!([{"a": ""}, {"a": "y"}]));
    let session = session_for(&[("A", Some("a")), ("B", None)], &extraction.headers);
    let file = export(session.targets(), &extraction.rows, &request(ExportFormat::Csv)).unwrap();
    assert_eq!(String::from_utf8(file.bytes).unwrap(), "A,B\r\n,\r\ny,");
}

#[test]
fn whole_floats_export_as_integers_in_every_format() {
    let extraction = extract(&json!([{"age": 30.0, "ratio": 0.5}]));
    let session = session_for(&[("Age", Some("age")), ("Ratio", Some("ratio"))], &extraction.headers);
    let json_file = export(session.targets(), &extraction.rows, &request(ExportFormat::Json)).unwrap();
    let parsed: Value = serde_json::from_slice(&json_file.bytes).unwrap();
    assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"[{"Age":30,"Ratio":0.5}]"#);

    let csv_file = export(session.targets(), &extraction.rows, &request(ExportFormat::Csv)).unwrap();
    assert_eq!(String::from_utf8(csv_file.bytes).unwrap(), "Age,Ratio\r\n30,0.5");
}
