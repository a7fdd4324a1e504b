use serde::{Deserialize, Serialize};

use crate::domain::SelectionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperation {
    ListBrands,
    ListAllCars,
    ListModelsForBrand,
    ListVersionsForBrandModel,
}

impl QueryOperation {
    /// Column holding the display value in this operation's rows.
    pub fn row_field(self) -> &'static str {
        match self {
            QueryOperation::ListBrands => "make",
            QueryOperation::ListAllCars => "rangename",
            QueryOperation::ListModelsForBrand => "car_range",
            QueryOperation::ListVersionsForBrandModel => "car_version",
        }
    }

    pub fn target(self) -> SelectionKind {
        match self {
            QueryOperation::ListBrands => SelectionKind::Brand,
            QueryOperation::ListAllCars | QueryOperation::ListModelsForBrand => {
                SelectionKind::Model
            }
            QueryOperation::ListVersionsForBrandModel => SelectionKind::Version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsForBrandParams {
    pub brand: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsForBrandModelParams {
    pub brand: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuery {
    pub select: String,
    pub limit: u32,
}

impl TableQuery {
    pub fn all_columns(limit: u32) -> Self {
        Self {
            select: "*".to_string(),
            limit,
        }
    }
}
