use std::fmt;

use serde::{Deserialize, Serialize};

/// Brand value meaning "no brand filter".
pub const ALL_BRANDS: &str = "all";

/// One row of a query-service result set. Rows carry no fixed shape.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Brand,
    Model,
    Version,
}

impl SelectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionKind::Brand => "brand",
            SelectionKind::Model => "model",
            SelectionKind::Version => "version",
        }
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarSummary {
    pub model_name: Option<String>,
    pub type_name: Option<String>,
}

impl CarSummary {
    pub fn from_row(row: &Row) -> Self {
        let text = |key: &str| row.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            model_name: text("modelname"),
            type_name: text("typename"),
        }
    }
}
