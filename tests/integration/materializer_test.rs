//! Result materialization across the shapes executors and agents produce.

use db_ask::db::{ColumnInfo, QueryResult, Value};
use db_ask::materialize::{CanonicalTable, Materializer, RawResult};
use pretty_assertions::assert_eq;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn materialize(raw: RawResult, sql: &str, question: &str) -> CanonicalTable {
    Materializer::default().materialize(&raw, sql, question).table
}

#[test]
fn test_stringified_decimal_rows() {
    let table = materialize(
        RawResult::Text("[(1, Decimal('500000.00')), (2, Decimal('750000.00'))]".to_string()),
        "SELECT property_id, price FROM properties",
        "list property prices",
    );

    assert_eq!(table.columns(), strings(&["Property Id", "Price"]).as_slice());
    assert_eq!(
        table.rows(),
        [strings(&["1", "$500,000.00"]), strings(&["2", "$750,000.00"])].as_slice()
    );
}

#[test]
fn test_count_layout() {
    let table = materialize(
        RawResult::Text("[(42,)]".to_string()),
        "SELECT COUNT(*) FROM properties",
        "how many properties are there",
    );

    assert_eq!(table.columns(), strings(&["Description", "Count"]).as_slice());
    assert_eq!(table.rows(), [strings(&["Total records", "42"])].as_slice());
}

#[test]
fn test_count_label_follows_question() {
    let table = materialize(
        RawResult::Scalar(Value::Int(1234)),
        "SELECT COUNT(*) FROM transactions",
        "how many sales closed last year",
    );
    assert_eq!(table.rows(), [strings(&["Total sales", "1,234"])].as_slice());
}

#[test]
fn test_every_row_matches_column_count() {
    let inputs = [
        RawResult::Text("[(1, 'a'), (2,), (3, 'c', 'extra')]".to_string()),
        RawResult::Rows {
            columns: vec![ColumnInfo::new("a", "int4")],
            rows: vec![vec![Value::Int(1), Value::Int(2)], vec![]],
        },
        RawResult::Text("[['Austin', 'TX'], ['Denver']]".to_string()),
        RawResult::Scalar(Value::Bool(true)),
    ];

    for raw in inputs {
        let table = materialize(raw.clone(), "SELECT * FROM t", "");
        assert!(!table.columns().is_empty(), "no columns for {:?}", raw);
        for row in table.rows() {
            assert_eq!(row.len(), table.columns().len(), "ragged row for {:?}", raw);
        }
    }
}

#[test]
fn test_column_names_are_unique() {
    let table = materialize(
        RawResult::Text("[(1, 2)]".to_string()),
        "SELECT a.id, b.id FROM a JOIN b ON a.id = b.ref",
        "",
    );
    assert_eq!(table.columns(), strings(&["Id", "Id 2"]).as_slice());
}

#[test]
fn test_empty_results_say_no_data() {
    let empty_rows = RawResult::Rows {
        columns: vec![ColumnInfo::new("city", "text")],
        rows: vec![],
    };
    for raw in [empty_rows, RawResult::Text("[]".to_string())] {
        assert_eq!(
            materialize(raw, "SELECT city FROM locations", ""),
            CanonicalTable::single_cell("Result", "No data")
        );
    }
}

#[test]
fn test_empty_text_is_an_empty_result_cell() {
    assert_eq!(
        materialize(RawResult::Text(String::new()), "", ""),
        CanonicalTable::single_cell("Result", "")
    );
}

#[test]
fn test_executor_result_keeps_types() {
    let result = QueryResult::with_data(
        vec![
            ColumnInfo::new("agency", "text"),
            ColumnInfo::new("commission_rate", "numeric"),
            ColumnInfo::new("total_sales", "numeric"),
        ],
        vec![
            vec![
                Value::from("Sunrise Realty"),
                Value::Float(0.03),
                Value::Float(15_250_000.0),
            ],
            vec![Value::from("Keystone Homes"), Value::Null, Value::Float(980_000.5)],
        ],
    );

    let table = materialize(
        result.into(),
        "SELECT agency, commission_rate, total_sales FROM agents",
        "",
    );

    assert_eq!(
        table.columns(),
        strings(&["Agency", "Commission Rate", "Total Sales"]).as_slice()
    );
    assert_eq!(
        table.rows(),
        [
            strings(&["Sunrise Realty", "0.03", "$15,250,000.00"]),
            strings(&["Keystone Homes", "", "$980,000.50"]),
        ]
        .as_slice()
    );
}

#[test]
fn test_table_listing() {
    let table = materialize(
        RawResult::Text("[('AGENTS', 'BASE TABLE'), ('OWNERS', 'VIEW')]".to_string()),
        "SELECT TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES",
        "list tables",
    );
    assert_eq!(table.columns(), strings(&["Name", "Type"]).as_slice());
    assert_eq!(table.rows()[1], strings(&["OWNERS", "VIEW"]));
}

#[test]
fn test_rendered_text_is_aligned() {
    let table = CanonicalTable::new(
        strings(&["City", "State"]),
        vec![strings(&["Austin", "TX"]), strings(&["Denver", "CO"])],
    );
    let rendered = table.render_text();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "City   │ State");
    assert_eq!(lines[2], "Austin │ TX");
    assert_eq!(lines.last(), Some(&"2 rows"));
}
