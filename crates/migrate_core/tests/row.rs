use migrate_core::ProductRow;

fn row(pairs: &[(&str, &str)]) -> ProductRow {
    ProductRow::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn image_column_is_found_under_varied_names() {
    for name in ["Image Link", "image_url", "Image URL", "image", "URL"] {
        let row = row(&[("Name", "Soap"), (name, "https://cdn/x.png")]);
        assert_eq!(row.image_url(), Some("https://cdn/x.png"));
    }
}

#[test]
fn empty_image_cell_counts_as_missing() {
    let row = row(&[("Name", "Soap"), ("Image Link", "")]);
    assert_eq!(row.image_url(), None);
}

#[test]
fn unknown_columns_are_preserved_in_order() {
    let row = row(&[("Zeta", "1"), ("Alpha", "2"), ("Image Link", "u")]);
    let names: Vec<&str> = row.columns().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Image Link"]);
}

#[test]
fn label_prefers_product_name() {
    assert_eq!(row(&[("Name", "Soap"), ("URL", "u")]).label(), "Soap");
    assert_eq!(row(&[("Sku", ""), ("URL", "u")]).label(), "u");
    assert_eq!(row(&[("Sku", "")]).label(), "<empty row>");
}
