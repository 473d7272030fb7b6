/// One input CSV row: ordered `(column, value)` pairs.
///
/// Unknown columns pass through verbatim to the augmented output, so the row
/// keeps its source order instead of collapsing into a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    columns: Vec<(String, String)>,
}

/// Column headers recognized as the image URL, checked in order.
const IMAGE_COLUMNS: &[&str] = &[
    "Image Link",
    "image_link",
    "ImageLink",
    "image_url",
    "Image URL",
    "ImageURL",
    "image",
    "Image",
    "url",
    "URL",
];

impl ProductRow {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    /// Value of the named column, if present and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// The image URL, located by recognized column names.
    pub fn image_url(&self) -> Option<&str> {
        IMAGE_COLUMNS.iter().find_map(|name| self.get(name))
    }

    /// Short human-readable label for log lines: the product name when the
    /// row has one, otherwise the first non-empty column value.
    pub fn label(&self) -> &str {
        self.get("Name")
            .or_else(|| self.get("name"))
            .or_else(|| {
                self.columns
                    .iter()
                    .map(|(_, value)| value.as_str())
                    .find(|value| !value.is_empty())
            })
            .unwrap_or("<empty row>")
    }
}
