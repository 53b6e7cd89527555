//! CoordID HTTP server.
//!
//! Encodes coordinates to CoordIDs, decodes CoordIDs back to their cell and
//! boundary, and serves the boundary maps of covered countries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coordid::config::Config;
use coordid::models::geojson::{Feature, FeatureCollection};
use coordid::provider::{
    list_countries, BoundaryProvider, CachedCountry, CachedProvider, CountryInfo, DirectoryProvider,
};
use coordid::{BoundaryFeature, Codec, CoordError, CoordId, GridCell};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "CoordID HTTP server")]
struct Args {
    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Boundary data directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    provider: CachedProvider<DirectoryProvider>,
    names: HashMap<String, String>,
    codec: Codec,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    let listen = args.listen.unwrap_or(config.server.listen);
    let data_dir = args.data_dir.unwrap_or(config.data.dir);

    info!("CoordID Server");
    info!("Boundary data from {}", data_dir.display());

    let provider = CachedProvider::new(DirectoryProvider::new(&data_dir));
    let covered = provider.inner().countries()?;
    if covered.is_empty() {
        warn!("No boundary files found in {}", data_dir.display());
    } else {
        info!("{} countries available: {}", covered.len(), covered.join(", "));
    }

    let cors = cors_layer(&config.server.allowed_origins)?;

    let state = Arc::new(AppState {
        provider,
        names: config.countries,
        codec: Codec::default(),
    });

    let app = router(state, cors);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/countries", get(countries_handler))
        .route("/v1/countries/{code}", get(country_map_handler))
        .route("/v1/encode", get(encode_handler))
        .route("/v1/decode", get(decode_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    info!("CORS restricted to {} origins", origins.len());
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET]))
}

/// Error body: `{"error": kind, "message": text}`
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request",
            message: message.into(),
        }
    }
}

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        let status = match &err {
            CoordError::NotFound(_) | CoordError::UnknownCountry(_) => StatusCode::NOT_FOUND,
            CoordError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            CoordError::IndexOutOfRange { .. } => StatusCode::GONE,
            CoordError::InvalidBoundaryData(_) | CoordError::Io(_) | CoordError::Json(_) => {
                error!("Boundary data failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.kind, "message": self.message }));
        (self.status, body).into_response()
    }
}

/// Run blocking work (file loads, tessellation) off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("Blocking task failed: {}", e);
        ApiError::internal(e.to_string())
    })?
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cached: state.provider.cached(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    cached: Vec<CachedCountry>,
}

#[derive(Deserialize)]
struct CountriesQueryParams {
    /// Case-insensitive filter on code or name
    query: Option<String>,
}

/// Covered countries
async fn countries_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountriesQueryParams>,
) -> Result<Json<Vec<CountryInfo>>, ApiError> {
    let countries = blocking(move || {
        list_countries(state.provider.inner(), &state.names, params.query.as_deref())
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(countries))
}

#[derive(Serialize)]
struct CountryMapResponse {
    code: String,
    fingerprint: String,
    map: FeatureCollection,
}

/// Boundary map of one country
async fn country_map_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CountryMapResponse>, ApiError> {
    let response = blocking(move || {
        let collection = state.provider.get(&code)?;
        Ok(CountryMapResponse {
            fingerprint: format!("{:016x}", collection.fingerprint()),
            map: collection.to_feature_collection(),
            code,
        })
    })
    .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct EncodeQueryParams {
    country: String,
    lon: f64,
    lat: f64,
}

#[derive(Deserialize)]
struct DecodeQueryParams {
    id: String,
}

/// Encode and decode share one response shape
#[derive(Serialize)]
struct CoordResponse {
    coord_id: CoordId,
    /// `[lon, lat]` of the cell centre
    center: [f64; 2],
    /// Country and admin level names for display
    admin: Vec<String>,
    boundary: Feature,
    cell: Feature,
    fingerprint: String,
}

impl CoordResponse {
    fn new(coord_id: CoordId, boundary: &BoundaryFeature, cell: &GridCell, fingerprint: u64) -> Self {
        let center = cell.center();
        Self {
            coord_id,
            center: [center.x(), center.y()],
            admin: boundary.attributes.display_names(),
            boundary: boundary.to_geojson(),
            cell: cell.to_geojson(),
            fingerprint: format!("{:016x}", fingerprint),
        }
    }
}

/// Coordinate to CoordID
async fn encode_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EncodeQueryParams>,
) -> Result<Json<CoordResponse>, ApiError> {
    if !params.lon.is_finite() || !params.lat.is_finite() {
        return Err(ApiError::bad_request("lon and lat must be finite numbers"));
    }

    let response = blocking(move || {
        let collection = state.provider.get(&params.country)?;
        let point = Point::new(params.lon, params.lat);
        let encoded = state.codec.encode(&collection, &params.country, point)?;
        Ok(CoordResponse::new(
            encoded.id,
            encoded.boundary,
            &encoded.cell,
            collection.fingerprint(),
        ))
    })
    .await?;
    Ok(Json(response))
}

/// CoordID to cell, boundary and centre
async fn decode_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DecodeQueryParams>,
) -> Result<Json<CoordResponse>, ApiError> {
    let id: CoordId = params.id.trim().parse()?;

    let response = blocking(move || {
        let collection = state.provider.get(id.country())?;
        let decoded = state.codec.decode_id(&collection, id)?;
        Ok(CoordResponse::new(
            decoded.id,
            decoded.boundary,
            &decoded.cell,
            collection.fingerprint(),
        ))
    })
    .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::{Builder, TempDir};
    use tower::ServiceExt;

    /// One 0.01 degree square and a feature without geometry
    const CIV: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"COUNTRY": "coteDivoire", "NAME_1": "lagunes"},
         "geometry": {"type": "Polygon", "coordinates": [[[-4.02, 5.31], [-4.01, 5.31], [-4.01, 5.32], [-4.02, 5.32], [-4.02, 5.31]]]}},
        {"type": "Feature", "properties": {}, "geometry": null}
    ]}"#;

    fn build_test_app() -> (TempDir, Router) {
        let dir = Builder::new().prefix("coordid-server-").tempdir().unwrap();
        std::fs::write(dir.path().join("CIV.geojson"), CIV).unwrap();

        let mut names = HashMap::new();
        names.insert("CIV".to_string(), "Côte d'Ivoire".to_string());
        let state = Arc::new(AppState {
            provider: CachedProvider::new(DirectoryProvider::new(dir.path())),
            names,
            codec: Codec::default(),
        });
        let app = router(state, cors_layer(&[]).unwrap());
        (dir, app)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_countries() {
        let (_dir, app) = build_test_app();

        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get_json(&app, "/v1/countries?query=ivoire").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["code"], "CIV");
        assert_eq!(body[0]["name"], "Côte d'Ivoire");

        let (status, body) = get_json(&app, "/v1/countries/CIV").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["map"]["features"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_encode_then_decode() {
        let (_dir, app) = build_test_app();

        let (status, encoded) = get_json(&app, "/v1/encode?country=CIV&lon=-4.015&lat=5.315").await;
        assert_eq!(status, StatusCode::OK);
        let id = encoded["coord_id"].as_str().unwrap().to_string();
        assert!(id.starts_with("CIV-0-"), "{}", id);
        assert_eq!(encoded["admin"], serde_json::json!(["Cote Divoire", "Lagunes"]));
        assert_eq!(encoded["cell"]["geometry"]["type"], "Polygon");

        let (status, decoded) = get_json(&app, &format!("/v1/decode?id={}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decoded["coord_id"], encoded["coord_id"]);
        assert_eq!(decoded["center"], encoded["center"]);
        assert_eq!(decoded["fingerprint"], encoded["fingerprint"]);

        // the cached country now shows up in the health report
        let (_, health) = get_json(&app, "/health").await;
        assert_eq!(health["cached"][0]["code"], "CIV");
    }

    #[tokio::test]
    async fn test_error_statuses_and_bodies() {
        let (_dir, app) = build_test_app();

        let cases = [
            ("/v1/encode?country=CIV&lon=-3.0&lat=5.0", StatusCode::NOT_FOUND, "not_found"),
            ("/v1/encode?country=CIV&lon=-4.01999&lat=5.315", StatusCode::NOT_FOUND, "uncovered_gap"),
            ("/v1/encode?country=GHA&lon=-4.015&lat=5.315", StatusCode::NOT_FOUND, "unknown_country"),
            ("/v1/countries/GHA", StatusCode::NOT_FOUND, "unknown_country"),
            ("/v1/decode?id=CIV-1", StatusCode::BAD_REQUEST, "invalid_format"),
            ("/v1/decode?id=CIV-01-0", StatusCode::BAD_REQUEST, "invalid_format"),
            ("/v1/decode?id=CIV-999999-0", StatusCode::GONE, "index_out_of_range"),
            ("/v1/decode?id=CIV-1-0", StatusCode::GONE, "index_out_of_range"),
            ("/v1/decode?id=GHA-0-0", StatusCode::NOT_FOUND, "unknown_country"),
        ];

        for (uri, expected_status, expected_kind) in cases {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, expected_status, "{}", uri);
            assert_eq!(body["error"], expected_kind, "{}", uri);
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()), "{}", uri);
        }
    }

    #[test]
    fn test_error_mapping() {
        let err = ApiError::from(CoordError::InvalidBoundaryData("ring".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, "invalid_boundary_data");

        let err = ApiError::from(CoordError::IndexOutOfRange {
            kind: coordid::IndexKind::Grid,
            index: 7,
            len: 3,
        });
        assert_eq!(err.status, StatusCode::GONE);
        assert_eq!(err.message, "grid index 7 out of range (len 3)");
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&["https://coordid.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
