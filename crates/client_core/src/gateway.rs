use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::Row,
    error::{ServiceError, ServiceException},
    protocol::{ModelsForBrandParams, NoParams, TableQuery, VersionsForBrandModelParams},
};
use tracing::debug;

use crate::config::Settings;

#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn list_brands(&self) -> Result<Vec<Row>>;
    async fn list_all_cars(&self, limit: u32) -> Result<Vec<Row>>;
    async fn list_models_for_brand(&self, brand: &str) -> Result<Vec<Row>>;
    async fn list_versions_for_brand_model(&self, brand: &str, model: &str) -> Result<Vec<Row>>;
}

pub struct MissingQueryGateway;

#[async_trait]
impl QueryGateway for MissingQueryGateway {
    async fn list_brands(&self) -> Result<Vec<Row>> {
        Err(anyhow!("query service is unavailable"))
    }

    async fn list_all_cars(&self, _limit: u32) -> Result<Vec<Row>> {
        Err(anyhow!("query service is unavailable"))
    }

    async fn list_models_for_brand(&self, brand: &str) -> Result<Vec<Row>> {
        Err(anyhow!("query service is unavailable for brand {brand}"))
    }

    async fn list_versions_for_brand_model(&self, brand: &str, model: &str) -> Result<Vec<Row>> {
        Err(anyhow!(
            "query service is unavailable for brand {brand} model {model}"
        ))
    }
}

/// Gateway speaking the PostgREST dialect: stored functions under `/rpc` and
/// plain table reads with `select`/`limit` query parameters.
pub struct HttpQueryGateway {
    http: Client,
    settings: Settings,
}

impl HttpQueryGateway {
    pub fn new(settings: Settings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(http: Client, settings: Settings) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.settings.service_url,
            self.settings.rest_prefix,
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.settings.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn call_rpc<P: Serialize + ?Sized>(&self, function: &str, params: &P) -> Result<Vec<Row>> {
        let url = self.endpoint(&format!("rpc/{function}"));
        let response = self
            .authorize(self.http.post(&url).json(params))
            .send()
            .await
            .with_context(|| format!("failed to call {function}"))?;
        read_rows(response)
            .await
            .with_context(|| format!("rpc {function} failed"))
    }

    async fn read_table(&self, table: &str, query: &TableQuery) -> Result<Vec<Row>> {
        let url = self.endpoint(table);
        let response = self
            .authorize(self.http.get(&url).query(query))
            .send()
            .await
            .with_context(|| format!("failed to read table {table}"))?;
        read_rows(response)
            .await
            .with_context(|| format!("reading table {table} failed"))
    }
}

async fn read_rows(response: Response) -> Result<Vec<Row>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.json::<ServiceError>().await.ok();
        return Err(ServiceException::new(status.as_u16(), body).into());
    }

    let payload: Value = response.json().await.context("invalid JSON payload")?;
    rows_from_value(payload)
}

/// Accepts a JSON array and keeps its object elements; anything else in the
/// array is a malformed row and is skipped.
pub fn rows_from_value(payload: Value) -> Result<Vec<Row>> {
    let Value::Array(items) = payload else {
        return Err(anyhow!("expected a JSON array of rows"));
    };
    let total = items.len();
    let rows: Vec<Row> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect();
    if rows.len() != total {
        debug!(
            "gateway: skipped {} malformed rows of {total}",
            total - rows.len()
        );
    }
    Ok(rows)
}

#[async_trait]
impl QueryGateway for HttpQueryGateway {
    async fn list_brands(&self) -> Result<Vec<Row>> {
        self.call_rpc(&self.settings.brands_function, &NoParams {})
            .await
    }

    async fn list_all_cars(&self, limit: u32) -> Result<Vec<Row>> {
        self.read_table(&self.settings.cars_table, &TableQuery::all_columns(limit))
            .await
    }

    async fn list_models_for_brand(&self, brand: &str) -> Result<Vec<Row>> {
        let params = ModelsForBrandParams {
            brand: brand.to_string(),
        };
        self.call_rpc(&self.settings.models_function, &params).await
    }

    async fn list_versions_for_brand_model(&self, brand: &str, model: &str) -> Result<Vec<Row>> {
        let params = VersionsForBrandModelParams {
            brand: brand.to_string(),
            model: model.to_string(),
        };
        self.call_rpc(&self.settings.versions_function, &params)
            .await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
