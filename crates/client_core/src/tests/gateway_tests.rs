use super::*;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::SelectionKind;
use tokio::{net::TcpListener, sync::Mutex};

use crate::CascadeLoader;

#[derive(Clone, Default)]
struct ServiceState {
    api_keys: Arc<Mutex<Vec<Option<String>>>>,
    bearer_tokens: Arc<Mutex<Vec<Option<String>>>>,
    table_queries: Arc<Mutex<Vec<TableQuery>>>,
}

impl ServiceState {
    async fn record(&self, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.api_keys.lock().await.push(header("apikey"));
        self.bearer_tokens.lock().await.push(header("authorization"));
    }
}

async fn handle_brands(State(state): State<ServiceState>, headers: HeaderMap) -> Json<Value> {
    state.record(&headers).await;
    Json(json!([
        {"make": "Audi"},
        {"make": "BMW"},
        {"make": ""},
        "not-a-row",
        {"make": "Audi"}
    ]))
}

async fn handle_models(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(params): Json<ModelsForBrandParams>,
) -> Json<Value> {
    state.record(&headers).await;
    match params.brand.as_str() {
        "VW" => Json(json!([
            {"car_range": "Polo", "modelname": "Polo 6", "typename": "Hatchback"},
            {"car_range": "Golf", "modelname": "Golf 8", "typename": "Hatchback"},
            {"car_range": "Golf", "modelname": "Golf 8 Variant", "typename": "Estate"}
        ])),
        _ => Json(json!([])),
    }
}

async fn handle_versions(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(params): Json<VersionsForBrandModelParams>,
) -> impl IntoResponse {
    state.record(&headers).await;
    if params.model == "Golf" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!(ServiceError::new("P0001", "version lookup failed"))),
        );
    }
    (
        StatusCode::OK,
        Json(json!([{"car_version": format!("{} {} base", params.brand, params.model)}])),
    )
}

async fn handle_cars(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Query(query): Query<TableQuery>,
) -> Json<Value> {
    state.record(&headers).await;
    state.table_queries.lock().await.push(query);
    Json(json!([
        {"rangename": "Golf"},
        {"rangename": "Polo"},
        {"rangename": "Golf"},
        {"rangename": " "}
    ]))
}

async fn handle_not_a_list() -> Json<Value> {
    Json(json!({"make": "Audi"}))
}

async fn spawn_query_service() -> Result<(String, ServiceState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServiceState::default();
    let app = Router::new()
        .route("/rest/v1/rpc/get_all_brands", post(handle_brands))
        .route("/rest/v1/rpc/get_cars_by_brand", post(handle_models))
        .route(
            "/rest/v1/rpc/get_versions_by_brand_model",
            post(handle_versions),
        )
        .route("/rest/v1/rpc/not_a_list", post(handle_not_a_list))
        .route("/rest/v1/cars", get(handle_cars))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn settings_for(service_url: String) -> Settings {
    Settings {
        service_url,
        api_key: Some("anon-key".to_string()),
        ..Settings::default()
    }
}

#[tokio::test]
async fn brands_rpc_sends_api_key_and_skips_malformed_rows() {
    let (service_url, state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(settings_for(service_url));

    let rows = gateway.list_brands().await.expect("brands");

    assert_eq!(rows.len(), 4);
    assert_eq!(
        state.api_keys.lock().await.as_slice(),
        &[Some("anon-key".to_string())]
    );
    assert_eq!(
        state.bearer_tokens.lock().await.as_slice(),
        &[Some("Bearer anon-key".to_string())]
    );
}

#[tokio::test]
async fn bulk_listing_passes_select_and_limit() {
    let (service_url, state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(settings_for(service_url));

    let rows = gateway.list_all_cars(50).await.expect("cars");

    assert_eq!(rows.len(), 4);
    assert_eq!(
        state.table_queries.lock().await.as_slice(),
        &[TableQuery::all_columns(50)]
    );
}

#[tokio::test]
async fn models_rpc_sends_brand_parameter() {
    let (service_url, _state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(settings_for(service_url));

    let vw = gateway.list_models_for_brand("VW").await.expect("models");
    let other = gateway.list_models_for_brand("Audi").await.expect("models");

    assert_eq!(vw.len(), 3);
    assert!(other.is_empty());
}

#[tokio::test]
async fn service_error_body_is_reported() {
    let (service_url, _state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(settings_for(service_url));

    let err = gateway
        .list_versions_for_brand_model("VW", "Golf")
        .await
        .expect_err("versions should fail");

    let exception = err
        .downcast_ref::<ServiceException>()
        .expect("service exception");
    assert_eq!(exception.status, 500);
    assert_eq!(
        exception.body.as_ref().and_then(|body| body.code.as_deref()),
        Some("P0001")
    );
    assert!(format!("{err:#}").contains("version lookup failed"));
}

#[tokio::test]
async fn non_array_payload_is_a_failure() {
    let (service_url, _state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(Settings {
        brands_function: "not_a_list".to_string(),
        ..settings_for(service_url)
    });

    let err = gateway.list_brands().await.expect_err("object payload");
    assert!(format!("{err:#}").contains("expected a JSON array"));
}

#[tokio::test]
async fn missing_route_surfaces_status() {
    let (service_url, _state) = spawn_query_service().await.expect("spawn service");
    let gateway = HttpQueryGateway::new(Settings {
        cars_table: "trucks".to_string(),
        ..settings_for(service_url)
    });

    let err = gateway.list_all_cars(5).await.expect_err("no such table");
    let exception = err
        .downcast_ref::<ServiceException>()
        .expect("service exception");
    assert_eq!(exception.status, 404);
}

#[test]
fn rows_from_value_rejects_scalars() {
    assert!(rows_from_value(json!("Audi")).is_err());
    assert_eq!(
        rows_from_value(json!([{"make": "Audi"}, 3, null]))
            .expect("rows")
            .len(),
        1
    );
}

#[tokio::test]
async fn missing_gateway_always_fails() {
    let gateway = MissingQueryGateway;
    assert!(gateway.list_brands().await.is_err());
    assert!(gateway.list_all_cars(50).await.is_err());
    assert!(gateway.list_models_for_brand("VW").await.is_err());
    assert!(gateway
        .list_versions_for_brand_model("VW", "Golf")
        .await
        .is_err());
}

#[tokio::test]
async fn loader_walks_the_cascade_over_http() {
    let (service_url, _state) = spawn_query_service().await.expect("spawn service");
    let settings = settings_for(service_url).prepared().expect("settings");
    let loader = CascadeLoader::from_settings(&settings);

    loader.start().await.settled().await;
    assert_eq!(
        loader.snapshot().await.brand.candidates,
        vec!["all", "Audi", "BMW"]
    );

    loader
        .set_brand("all")
        .await
        .expect("brand")
        .expect("fetch")
        .settled()
        .await;
    assert_eq!(
        loader.snapshot().await.model.candidates,
        vec!["Golf", "Polo"]
    );

    let mut rx = loader.subscribe_events();
    loader
        .set_brand("BMW")
        .await
        .expect("brand")
        .expect("fetch")
        .settled()
        .await;
    let snapshot = loader.snapshot().await;
    assert!(snapshot.model.candidates.is_empty());
    assert!(!snapshot.model.enabled);
    let mut saw_settled_snapshot = false;
    while let Ok(event) = rx.try_recv() {
        if let crate::LoaderEvent::Snapshot(published) = event {
            saw_settled_snapshot |= !published.selection(SelectionKind::Model).is_loading;
        }
    }
    assert!(saw_settled_snapshot);
}
