//! Selection state machine for the Brand → Model → Version cascade.
//!
//! `SelectionState` is a plain reducer: user setters perform the synchronous
//! part of a transition and hand back a [`FetchTicket`] describing the load to
//! run, and [`SelectionState::commit`] folds a finished load back in. Each
//! Selection carries a generation counter which is bumped whenever the
//! Selection is invalidated; a ticket whose generation no longer matches is
//! stale and its result is dropped.

use serde::Serialize;
use shared::{
    domain::{CarSummary, Row, SelectionKind, ALL_BRANDS},
    protocol::QueryOperation,
};
use thiserror::Error;

use crate::normalize::{brand_candidates, field, normalize};

pub const DEFAULT_ALL_CARS_LIMIT: u32 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{value:?} is not a {kind} candidate")]
    NotACandidate { kind: SelectionKind, value: String },
}

#[derive(Debug, Default, Clone)]
struct Selection {
    value: Option<String>,
    candidates: Vec<String>,
    is_loading: bool,
    generation: u64,
}

impl Selection {
    fn invalidate(&mut self) {
        self.value = None;
        self.candidates.clear();
        self.is_loading = false;
        self.generation += 1;
    }

    fn begin_load(&mut self) -> u64 {
        self.is_loading = true;
        self.generation
    }

    fn accepts(&self, value: &str) -> bool {
        self.candidates.iter().any(|candidate| candidate == value)
    }

    fn snapshot(&self, upstream_ready: bool) -> SelectionSnapshot {
        SelectionSnapshot {
            value: self.value.clone(),
            candidates: self.candidates.clone(),
            is_loading: self.is_loading,
            enabled: upstream_ready && !self.is_loading && !self.candidates.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Brands,
    AllCars { limit: u32 },
    ModelsForBrand { brand: String },
    VersionsForBrandModel { brand: String, model: String },
}

impl FetchRequest {
    pub fn operation(&self) -> QueryOperation {
        match self {
            FetchRequest::Brands => QueryOperation::ListBrands,
            FetchRequest::AllCars { .. } => QueryOperation::ListAllCars,
            FetchRequest::ModelsForBrand { .. } => QueryOperation::ListModelsForBrand,
            FetchRequest::VersionsForBrandModel { .. } => {
                QueryOperation::ListVersionsForBrandModel
            }
        }
    }

    pub fn target(&self) -> SelectionKind {
        self.operation().target()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub request: FetchRequest,
    pub generation: u64,
}

impl FetchTicket {
    pub fn target(&self) -> SelectionKind {
        self.request.target()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied { candidates: usize },
    Failed,
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSnapshot {
    pub value: Option<String>,
    pub candidates: Vec<String>,
    pub is_loading: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoaderSnapshot {
    pub brand: SelectionSnapshot,
    pub model: SelectionSnapshot,
    pub version: SelectionSnapshot,
    pub cars: Vec<CarSummary>,
}

impl LoaderSnapshot {
    pub fn selection(&self, kind: SelectionKind) -> &SelectionSnapshot {
        match kind {
            SelectionKind::Brand => &self.brand,
            SelectionKind::Model => &self.model,
            SelectionKind::Version => &self.version,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionState {
    brand: Selection,
    model: Selection,
    version: Selection,
    cars: Vec<CarSummary>,
    all_cars_limit: u32,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(DEFAULT_ALL_CARS_LIMIT)
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl SelectionState {
    pub fn new(all_cars_limit: u32) -> Self {
        Self {
            brand: Selection::default(),
            model: Selection::default(),
            version: Selection::default(),
            cars: Vec::new(),
            all_cars_limit,
        }
    }

    fn selection_mut(&mut self, kind: SelectionKind) -> &mut Selection {
        match kind {
            SelectionKind::Brand => &mut self.brand,
            SelectionKind::Model => &mut self.model,
            SelectionKind::Version => &mut self.version,
        }
    }

    fn clear_models(&mut self) {
        self.model.invalidate();
        self.cars.clear();
    }

    pub fn begin_brand_load(&mut self) -> FetchTicket {
        self.brand.generation += 1;
        FetchTicket {
            request: FetchRequest::Brands,
            generation: self.brand.begin_load(),
        }
    }

    pub fn select_brand(
        &mut self,
        value: impl Into<String>,
    ) -> Result<Option<FetchTicket>, SelectionError> {
        let value = non_empty(value.into());
        if let Some(brand) = &value {
            if brand != ALL_BRANDS && !self.brand.accepts(brand) {
                return Err(SelectionError::NotACandidate {
                    kind: SelectionKind::Brand,
                    value: brand.clone(),
                });
            }
        }

        self.brand.value = value;
        self.clear_models();
        self.version.invalidate();

        let request = match self.brand.value.as_deref() {
            None => return Ok(None),
            Some(ALL_BRANDS) => FetchRequest::AllCars {
                limit: self.all_cars_limit,
            },
            Some(brand) => FetchRequest::ModelsForBrand {
                brand: brand.to_string(),
            },
        };
        Ok(Some(FetchTicket {
            request,
            generation: self.model.begin_load(),
        }))
    }

    pub fn select_model(
        &mut self,
        value: impl Into<String>,
    ) -> Result<Option<FetchTicket>, SelectionError> {
        let value = non_empty(value.into());
        if let Some(model) = &value {
            if !self.model.accepts(model) {
                return Err(SelectionError::NotACandidate {
                    kind: SelectionKind::Model,
                    value: model.clone(),
                });
            }
        }

        self.model.value = value;
        self.version.invalidate();

        // Versions are only listed under a concrete brand.
        let (Some(brand), Some(model)) = (self.brand.value.as_deref(), self.model.value.as_deref())
        else {
            return Ok(None);
        };
        if brand == ALL_BRANDS {
            return Ok(None);
        }

        let request = FetchRequest::VersionsForBrandModel {
            brand: brand.to_string(),
            model: model.to_string(),
        };
        Ok(Some(FetchTicket {
            request,
            generation: self.version.begin_load(),
        }))
    }

    pub fn select_version(&mut self, value: impl Into<String>) -> Result<(), SelectionError> {
        let value = non_empty(value.into());
        if let Some(version) = &value {
            if !self.version.accepts(version) {
                return Err(SelectionError::NotACandidate {
                    kind: SelectionKind::Version,
                    value: version.clone(),
                });
            }
        }
        self.version.value = value;
        Ok(())
    }

    pub fn commit(
        &mut self,
        ticket: &FetchTicket,
        result: anyhow::Result<Vec<Row>>,
    ) -> CommitOutcome {
        let kind = ticket.target();
        if self.selection_mut(kind).generation != ticket.generation {
            return CommitOutcome::Stale;
        }

        let rows = match result {
            Ok(rows) => rows,
            Err(_) => {
                let selection = self.selection_mut(kind);
                selection.candidates.clear();
                selection.is_loading = false;
                if kind == SelectionKind::Model {
                    self.cars.clear();
                }
                return CommitOutcome::Failed;
            }
        };

        let operation = ticket.request.operation();
        let candidates = match operation {
            QueryOperation::ListBrands => brand_candidates(&rows),
            _ => normalize(&rows, field(operation.row_field())),
        };
        if kind == SelectionKind::Model {
            self.cars = rows.iter().map(CarSummary::from_row).collect();
        }

        let selection = self.selection_mut(kind);
        selection.candidates = candidates;
        selection.is_loading = false;
        CommitOutcome::Applied {
            candidates: selection.candidates.len(),
        }
    }

    pub fn generation(&self, kind: SelectionKind) -> u64 {
        match kind {
            SelectionKind::Brand => self.brand.generation,
            SelectionKind::Model => self.model.generation,
            SelectionKind::Version => self.version.generation,
        }
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            brand: self.brand.snapshot(true),
            model: self.model.snapshot(self.brand.value.is_some()),
            version: self.version.snapshot(self.model.value.is_some()),
            cars: self.cars.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
