use std::collections::BTreeMap;

use migrate_core::MappingRecord;
use migrate_engine::{
    final_result_path, read_input_csv, write_final_result_csv, write_mapping_csv, CsvError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const INPUT: &str = "\u{feff}Name,Main Category,Image Link\n\
Soap,Household,https://cdn.example/images/soap.png?w=270\n\
Towel,Household,https://cdn.example/images/towel.png?w=270\n";

#[test]
fn reads_rows_and_strips_bom_from_headers() {
    migrate_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("products.csv");
    std::fs::write(&input, INPUT).unwrap();

    let rows = read_input_csv(&input).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("Name"), Some("Soap"));
    assert_eq!(
        rows[0].image_url(),
        Some("https://cdn.example/images/soap.png?w=270")
    );
    assert_eq!(rows[1].get("Main Category"), Some("Household"));
}

#[test]
fn missing_input_is_a_distinct_error() {
    let temp = TempDir::new().unwrap();
    let err = read_input_csv(&temp.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, CsvError::MissingInput(_)));
}

#[test]
fn mapping_csv_has_the_contract_columns() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("mapping.csv");
    let mappings = vec![
        MappingRecord {
            old_url: "https://old/a".to_string(),
            new_url: "https://new/a".to_string(),
            status: "uploaded".to_string(),
            error: String::new(),
        },
        MappingRecord {
            old_url: "https://old/b".to_string(),
            new_url: String::new(),
            status: "failed".to_string(),
            error: "malformed url".to_string(),
        },
    ];

    write_mapping_csv(&output, &mappings).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("old_url,new_url,status,error"));
    assert_eq!(lines.next(), Some("https://old/a,https://new/a,uploaded,"));
    assert_eq!(lines.next(), Some("https://old/b,,failed,malformed url"));
}

#[test]
fn final_result_appends_new_url_column() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("products.csv");
    std::fs::write(&input, INPUT).unwrap();

    let mut successes = BTreeMap::new();
    successes.insert(
        "https://cdn.example/images/soap.png?w=270".to_string(),
        "https://res.cloudinary.com/demo/image/upload/w_270,f_auto,c_scale/product-images/soap"
            .to_string(),
    );

    let output = final_result_path(temp.path(), &input);
    assert_eq!(output.file_name().unwrap(), "Final_Result_products.csv");

    write_final_result_csv(&input, &output, &successes).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(
        lines.next(),
        Some("Name,Main Category,Image Link,New Image Link")
    );
    let soap = lines.next().unwrap();
    // The new URL contains commas, so the csv writer quotes the field.
    assert!(soap.ends_with("\"https://res.cloudinary.com/demo/image/upload/w_270,f_auto,c_scale/product-images/soap\""));
    let towel = lines.next().unwrap();
    assert!(towel.ends_with("PENDING/FAILED"));
}
