// ============================================================
// Layer 3 — ProductRecord Domain Type
// ============================================================
// One row of the product catalogue CSV, before any cleaning,
// vocabulary lookup, or tokenisation.
//
// Every field is optional: catalogue rows routinely miss a
// description, bullet points, or a brand. Empty CSV cells
// deserialise to None, and a column missing from the file
// altogether falls back to None through #[serde(default)].
//
// Example row:
//   TITLE:          "Stainless Steel Water Bottle 1L"
//   DESCRIPTION:    "Keeps drinks cold for 24 hours"
//   BULLET_POINTS:  "[BPA free, Leak proof]"
//   BRAND:          "Milton"
//   BROWSE_NODE_ID: "1045"

use serde::{Deserialize, Serialize};

/// Name of the category label column
pub const BROWSE_NODE_COLUMN: &str = "BROWSE_NODE_ID";

/// Name of the brand label column
pub const BRAND_COLUMN: &str = "BRAND";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "TITLE", default)]
    pub title: Option<String>,

    #[serde(rename = "DESCRIPTION", default)]
    pub description: Option<String>,

    #[serde(rename = "BULLET_POINTS", default)]
    pub bullet_points: Option<String>,

    #[serde(rename = "BRAND", default)]
    pub brand: Option<String>,

    /// Kept as a string: ids are only used as vocabulary keys
    #[serde(rename = "BROWSE_NODE_ID", default)]
    pub browse_node_id: Option<String>,
}

impl ProductRecord {
    /// Text fields in the order they are joined into the fingerprint
    pub fn text_fields(&self) -> [Option<&str>; 3] {
        [
            self.title.as_deref(),
            self.description.as_deref(),
            self.bullet_points.as_deref(),
        ]
    }

    /// Look up a label column by its CSV header name.
    /// Blank values count as missing.
    pub fn label(&self, column: &str) -> Option<&str> {
        let value = match column {
            BROWSE_NODE_COLUMN => self.browse_node_id.as_deref(),
            BRAND_COLUMN       => self.brand.as_deref(),
            _                  => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}
