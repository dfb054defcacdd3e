//! Generated SQL for the dynamic tables: DDL per the fixed type mapping and
//! DML shapes used by the record store.

use resource_engine::naming::{physical_name, ParameterType};
use resource_engine::sql::builder::{self, ColumnValue};
use resource_engine::sql::ddl;
use serde_json::json;

#[test]
fn vehicles_template_produces_vehicles_table() {
    let table = physical_name("Vehicles").unwrap();
    assert_eq!(table, "vehicles");
    let sql = ddl::create_record_table("resources", &table).unwrap();
    assert!(sql.starts_with("CREATE TABLE \"resources\".\"vehicles\""));
    assert!(sql.contains("\"id\" BIGSERIAL PRIMARY KEY"));
    assert!(sql.contains("\"photos_names\" TEXT"));
    assert!(sql.contains("\"document_names\" TEXT"));
}

#[test]
fn parameter_columns_follow_the_declared_type_mapping() {
    let cases = [
        (ParameterType::ShortText, "VARCHAR(255)"),
        (ParameterType::LongText, "TEXT"),
        (ParameterType::Integer, "BIGINT"),
        (ParameterType::Decimal, "DOUBLE PRECISION"),
        (ParameterType::Boolean, "BOOLEAN"),
        (ParameterType::DateTime, "TIMESTAMPTZ"),
        (ParameterType::Photo, "TEXT"),
        (ParameterType::Document, "TEXT"),
        (ParameterType::Relation { template_id: 5 }, "BIGINT"),
    ];
    for (ty, expected) in cases {
        let sql = ddl::add_column("resources", "vehicles", "p", ty.column_type()).unwrap();
        assert!(
            sql.ends_with(&format!("\"p\" {}", expected)),
            "{:?} -> {}",
            ty,
            sql
        );
    }
}

#[test]
fn record_insert_carries_builtins_and_attributes() {
    let q = builder::insert(
        "resources",
        "vehicles",
        &[
            ColumnValue::new("name", json!("Car1")),
            ColumnValue::new("description", serde_json::Value::Null),
            ColumnValue::new("user_id", json!(12)),
            ColumnValue::new("plate", json!("AA1234BB")),
        ],
    )
    .unwrap();
    assert_eq!(
        q.sql,
        "INSERT INTO \"resources\".\"vehicles\" (\"name\", \"description\", \"user_id\", \"plate\") \
         VALUES ($1, $2, $3, $4) RETURNING \"id\""
    );
    assert_eq!(q.params.len(), 4);
}

#[test]
fn timestamp_attributes_bind_with_a_cast() {
    let q = builder::insert(
        "resources",
        "vehicles",
        &[ColumnValue::with_cast(
            "serviced_at",
            json!("2024-03-01T10:00:00Z"),
            ParameterType::DateTime.bind_cast(),
        )],
    )
    .unwrap();
    assert!(q.sql.contains("$1::timestamptz"));
}

#[test]
fn listing_pages_in_insertion_order() {
    let cols: Vec<String> = ["id", "name", "plate"].iter().map(|s| s.to_string()).collect();
    let q = builder::select_page("resources", "vehicles", &cols, 5, 0).unwrap();
    assert!(q.sql.contains("ORDER BY \"id\""));
    assert!(q.sql.ends_with("LIMIT $1 OFFSET $2"));
}

#[test]
fn runtime_identifiers_outside_the_allow_list_never_reach_sql() {
    assert!(ddl::create_record_table("resources", "veh\"; drop table users; --").is_err());
    assert!(builder::count_all("resources", "Vehicles").is_err());
    assert!(builder::insert(
        "resources",
        "vehicles",
        &[ColumnValue::new("plate\" = '', \"x", json!("boom"))],
    )
    .is_err());
}

#[test]
fn dropping_a_parameter_drops_its_column() {
    let sql = ddl::drop_column("resources", "vehicles", "plate").unwrap();
    assert_eq!(
        sql,
        "ALTER TABLE \"resources\".\"vehicles\" DROP COLUMN \"plate\""
    );
}
