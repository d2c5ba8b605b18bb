//! HTTP handler functions for the gridscore API.

use actix_web::{HttpResponse, web};
use gridscore_engine::EngineError;
use gridscore_server_models::{
    ApiError, ApiHealth, CompareSitesResponse, FootprintRequest, GridBatchRequest, PredictParams,
    PredictResponse, SiteRequest,
};

use crate::AppState;

/// Maps engine errors to responses: bad coordinates and malformed batch
/// shapes are the caller's fault; anything else is a server fault.
fn error_response(error: &EngineError) -> HttpResponse {
    let body = ApiError {
        error: error.to_string(),
    };
    match error {
        EngineError::InvalidCoordinates { .. } | EngineError::InputShape { .. } => {
            HttpResponse::BadRequest().json(body)
        }
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        layers: state.engine.layer_summary(),
    })
}

/// `GET /api/countries`
///
/// Countries ranked by green score, best first.
pub async fn countries(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.engine.country_rankings())
}

/// `POST /api/predict-site`
pub async fn predict_site(
    state: web::Data<AppState>,
    body: web::Json<SiteRequest>,
) -> HttpResponse {
    match state
        .engine
        .predict(body.lat, body.lon, body.radius_km, body.year)
        .await
    {
        Ok(site) => HttpResponse::Ok().json(site),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/predict-footprint`
pub async fn predict_footprint(
    state: web::Data<AppState>,
    body: web::Json<FootprintRequest>,
) -> HttpResponse {
    match state
        .engine
        .predict_footprint(
            body.lat,
            body.lon,
            body.it_load_mw,
            body.provider.as_deref(),
            body.radius_km,
            body.year,
        )
        .await
    {
        Ok(footprint) => HttpResponse::Ok().json(footprint),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/predict-grid`
///
/// Vectorized evaluation over coordinate arrays.
pub async fn predict_grid(
    state: web::Data<AppState>,
    body: web::Json<GridBatchRequest>,
) -> HttpResponse {
    match state
        .engine
        .evaluate(&body.lats, &body.lons, body.year, body.it_load_mw)
    {
        Ok(batch) => HttpResponse::Ok().json(batch),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/compare-sites`
///
/// Ranks candidate sites by annual footprint, best first.
pub async fn compare_sites(
    state: web::Data<AppState>,
    body: web::Json<Vec<FootprintRequest>>,
) -> HttpResponse {
    let mut sites = Vec::with_capacity(body.len());
    for request in body.iter() {
        match state
            .engine
            .predict_footprint(
                request.lat,
                request.lon,
                request.it_load_mw,
                request.provider.as_deref(),
                request.radius_km,
                request.year,
            )
            .await
        {
            Ok(footprint) => sites.push(footprint),
            Err(e) => return error_response(&e),
        }
    }
    sites.sort_by(|a, b| a.annual_tonnes.total_cmp(&b.annual_tonnes));
    let savings_vs_worst = match (sites.first(), sites.last()) {
        (Some(best), Some(worst)) if sites.len() >= 2 => worst.annual_tonnes - best.annual_tonnes,
        _ => 0.0,
    };
    HttpResponse::Ok().json(CompareSitesResponse {
        sites,
        savings_vs_worst,
    })
}

/// `GET /predict?lat=..&lon=..&year=..`
///
/// Simple scalar inference through the vectorized path at 1 MW.
pub async fn predict(
    state: web::Data<AppState>,
    params: web::Query<PredictParams>,
) -> HttpResponse {
    match state
        .engine
        .evaluate(&[params.lat], &[params.lon], params.year, 1.0)
    {
        Ok(batch) => HttpResponse::Ok().json(PredictResponse {
            lat: params.lat,
            lon: params.lon,
            year: params.year,
            carbon_intensity: batch.intensity[0],
            footprint_tonnes_per_mw: batch.footprint[0],
            trend_b: batch.trend[0],
        }),
        Err(e) => error_response(&e),
    }
}
