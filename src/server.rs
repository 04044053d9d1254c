use crate::chart::{render_chart, ChartInstance};
use crate::config::AppConfig;
use crate::export;
use crate::processing;
use crate::types::Dataset;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Everything the dashboard holds for the process lifetime. The dataset is
/// read-only after load; the chart slot is the one mutable resource and holds
/// at most one live instance.
pub struct AppState {
    pub dataset: Dataset,
    pub config: AppConfig,
    pub chart: Mutex<Option<ChartInstance>>,
}

pub enum ChartOutcome {
    Svg(String),
    UnknownProvince,
    NoData,
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Dataset) -> Self {
        AppState {
            dataset,
            config,
            chart: Mutex::new(None),
        }
    }

    /// Renders the detail chart for one province and installs it in the
    /// slot. Storing the new instance drops the previous one, so exactly one
    /// chart is alive after any sequence of opens.
    pub fn open_chart(&self, nombre: &str) -> ChartOutcome {
        let Some(province) = self.dataset.provinces.iter().find(|p| p.nombre == nombre) else {
            return ChartOutcome::UnknownProvince;
        };

        let Some(instance) = render_chart(province) else {
            tracing::warn!("Province '{}' has no classification data, chart skipped", nombre);
            return ChartOutcome::NoData;
        };

        let svg = instance.svg.clone();
        let mut slot = self
            .chart
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(instance);
        ChartOutcome::Svg(svg)
    }
}

pub async fn start_server(config: AppConfig, dataset: Dataset) -> Result<()> {
    let port = config.server.port;
    let static_dir = config.server.static_dir.clone();
    let state = Arc::new(AppState::new(config, dataset));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/datos", get(datos_handler))
        .route("/api/maximos", get(maximos_handler))
        .route("/api/marcadores", get(marcadores_handler))
        .route("/api/provincias/:nombre/grafico", get(grafico_handler))
        .route("/api/maximos/panel", get(maxima_panel_handler))
        .route("/api/leyenda", get(leyenda_handler))
        .nest_service("/", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn datos_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(export::dataset_doc(&state.dataset))
}

async fn maximos_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(export::maxima_doc(&state.dataset.maxima))
}

async fn marcadores_handler(State(state): State<Arc<AppState>>) -> Json<Vec<processing::Marker>> {
    Json(processing::marker_layer(
        &state.dataset,
        &state.config.input.fallback_color,
    ))
}

async fn grafico_handler(
    State(state): State<Arc<AppState>>,
    Path(nombre): Path<String>,
) -> Response {
    match state.open_chart(&nombre) {
        ChartOutcome::Svg(svg) => {
            ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
        }
        ChartOutcome::UnknownProvince => StatusCode::NOT_FOUND.into_response(),
        ChartOutcome::NoData => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn maxima_panel_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<processing::MaximaRow>> {
    Json(processing::maxima_rows(&state.dataset))
}

async fn leyenda_handler(State(state): State<Arc<AppState>>) -> Json<Vec<processing::LegendRow>> {
    Json(processing::legend_rows(&state.dataset))
}
