use std::sync::Arc;

use anyhow::Result;
use shared::domain::{Row, SelectionKind};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub mod config;
pub mod gateway;
pub mod normalize;
pub mod selection;

pub use config::{load_settings, Settings};
pub use gateway::{HttpQueryGateway, MissingQueryGateway, QueryGateway};
pub use selection::{
    CommitOutcome, FetchRequest, FetchTicket, LoaderSnapshot, SelectionError, SelectionSnapshot,
    SelectionState, DEFAULT_ALL_CARS_LIMIT,
};

#[derive(Debug, Clone)]
pub enum LoaderEvent {
    Snapshot(LoaderSnapshot),
    FetchFailed {
        target: SelectionKind,
        reason: String,
    },
    FetchDiscarded {
        target: SelectionKind,
        generation: u64,
    },
}

pub struct PendingFetch {
    target: SelectionKind,
    generation: u64,
    task: JoinHandle<()>,
}

impl PendingFetch {
    pub fn target(&self) -> SelectionKind {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn settled(self) {
        if let Err(err) = self.task.await {
            warn!(
                "loader: {} fetch task generation={} ended abnormally: {err}",
                self.target, self.generation
            );
        }
    }
}

/// No fetch timeout: a gateway call that never returns keeps its list loading.
pub struct CascadeLoader {
    gateway: Arc<dyn QueryGateway>,
    inner: Mutex<SelectionState>,
    events: broadcast::Sender<LoaderEvent>,
}

impl CascadeLoader {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Arc<Self> {
        Self::with_all_cars_limit(gateway, DEFAULT_ALL_CARS_LIMIT)
    }

    pub fn with_all_cars_limit(gateway: Arc<dyn QueryGateway>, all_cars_limit: u32) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            inner: Mutex::new(SelectionState::new(all_cars_limit)),
            events,
        })
    }

    pub fn from_settings(settings: &Settings) -> Arc<Self> {
        Self::with_all_cars_limit(
            Arc::new(HttpQueryGateway::new(settings.clone())),
            settings.all_cars_limit,
        )
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> LoaderSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn start(self: &Arc<Self>) -> PendingFetch {
        self.reload_brands().await
    }

    pub async fn reload_brands(self: &Arc<Self>) -> PendingFetch {
        let ticket = {
            let mut state = self.inner.lock().await;
            let ticket = state.begin_brand_load();
            self.publish(&state);
            ticket
        };
        self.spawn_fetch(ticket)
    }

    pub async fn set_brand(
        self: &Arc<Self>,
        value: impl Into<String>,
    ) -> Result<Option<PendingFetch>, SelectionError> {
        let ticket = {
            let mut state = self.inner.lock().await;
            let ticket = state.select_brand(value).inspect_err(log_rejection)?;
            self.publish(&state);
            ticket
        };
        Ok(ticket.map(|ticket| self.spawn_fetch(ticket)))
    }

    pub async fn set_model(
        self: &Arc<Self>,
        value: impl Into<String>,
    ) -> Result<Option<PendingFetch>, SelectionError> {
        let ticket = {
            let mut state = self.inner.lock().await;
            let ticket = state.select_model(value).inspect_err(log_rejection)?;
            self.publish(&state);
            ticket
        };
        Ok(ticket.map(|ticket| self.spawn_fetch(ticket)))
    }

    pub async fn set_version(&self, value: impl Into<String>) -> Result<(), SelectionError> {
        let mut state = self.inner.lock().await;
        state.select_version(value).inspect_err(log_rejection)?;
        self.publish(&state);
        Ok(())
    }

    fn publish(&self, state: &SelectionState) {
        let _ = self.events.send(LoaderEvent::Snapshot(state.snapshot()));
    }

    fn spawn_fetch(self: &Arc<Self>, ticket: FetchTicket) -> PendingFetch {
        let target = ticket.target();
        let generation = ticket.generation;
        info!(
            "loader: fetching {target} candidates generation={generation} request={:?}",
            ticket.request
        );

        let loader = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = loader.run_request(&ticket.request).await;
            let failure = result.as_ref().err().map(|err| format!("{err:#}"));
            if let Ok(rows) = &result {
                debug!(
                    "loader: {target} fetch generation={generation} returned {} rows",
                    rows.len()
                );
            }

            let mut state = loader.inner.lock().await;
            match state.commit(&ticket, result) {
                CommitOutcome::Applied { candidates } => {
                    info!(
                        "loader: committed {candidates} {target} candidates generation={generation}"
                    );
                    loader.publish(&state);
                }
                CommitOutcome::Failed => {
                    let reason = failure.unwrap_or_default();
                    error!(
                        "loader: {target} fetch generation={generation} failed: {reason}"
                    );
                    loader.publish(&state);
                    let _ = loader
                        .events
                        .send(LoaderEvent::FetchFailed { target, reason });
                }
                CommitOutcome::Stale => {
                    debug!(
                        "loader: discarded stale {target} result generation={generation} current={}",
                        state.generation(target)
                    );
                    let _ = loader
                        .events
                        .send(LoaderEvent::FetchDiscarded { target, generation });
                }
            }
        });

        PendingFetch {
            target,
            generation,
            task,
        }
    }

    async fn run_request(&self, request: &FetchRequest) -> Result<Vec<Row>> {
        match request {
            FetchRequest::Brands => self.gateway.list_brands().await,
            FetchRequest::AllCars { limit } => self.gateway.list_all_cars(*limit).await,
            FetchRequest::ModelsForBrand { brand } => {
                self.gateway.list_models_for_brand(brand).await
            }
            FetchRequest::VersionsForBrandModel { brand, model } => {
                self.gateway
                    .list_versions_for_brand_model(brand, model)
                    .await
            }
        }
    }
}

fn log_rejection(err: &SelectionError) {
    warn!("loader: rejected selection: {err}");
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
