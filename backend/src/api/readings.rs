use crate::{
    config::AppConfig,
    errors::ServiceError,
    services::{
        access::AccessGate,
        auth::Claims,
        export::{export_filename, render_csv, render_pdf},
        ingest::{IngestService, REQUIRED_FIELDS},
        range_query::{ChartSeries, PolicyKind, RangeQuery, RangeQueryService},
        reading_store::ReadingStore,
        span::span_label,
    },
};
use actix_web::{HttpRequest, HttpResponse, get, http::header, post, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Deserialize, Debug, Default)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub every: Option<String>,
    pub policy: Option<PolicyKind>,
    pub order: Option<String>,
}

impl RangeParams {
    fn to_query<'a>(&'a self, chamber: &'a str) -> RangeQuery<'a> {
        RangeQuery {
            chamber,
            start: self.start.as_deref(),
            end: self.end.as_deref(),
            every: self.every.as_deref(),
            policy: self.policy,
        }
    }

    fn newest_first(&self) -> Result<bool, ServiceError> {
        match self.order.as_deref().map(str::trim) {
            None | Some("") | Some("asc") => Ok(false),
            Some("desc") => Ok(true),
            Some(other) => Err(ServiceError::Validation(format!(
                "Invalid order: {} (expected asc or desc)",
                other
            ))),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ChartParams {
    pub every: Option<String>,
}

#[derive(Serialize)]
pub struct ChamberInfo {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Serialize)]
pub struct ChambersResponse {
    pub is_superuser: bool,
    pub default_chamber: Option<&'static str>,
    pub chambers: Vec<ChamberInfo>,
}

// ============================================================================
// Endpoints
// ============================================================================

/// Chambers the caller may open, plus the one to land on after login
#[get("")]
pub async fn list_chambers(
    gate: web::Data<dyn AccessGate>,
    claims: Claims,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id()?;
    let allowed = gate.allowed_chambers(user_id)?;

    Ok(HttpResponse::Ok().json(ChambersResponse {
        is_superuser: gate.is_superuser(user_id)?,
        default_chamber: allowed.first().map(|c| c.as_str()),
        chambers: allowed
            .iter()
            .map(|c| ChamberInfo {
                id: c.as_str(),
                name: c.display_name(),
            })
            .collect(),
    }))
}

/// Device endpoint: store one reading (no login)
#[post("/{ch}/readings")]
pub async fn ingest_reading(
    store: web::Data<dyn ReadingStore>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let chamber = path.into_inner();
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let service = IngestService::new(store.get_ref(), config.timezone);
    match service.ingest(&chamber, content_type, &body, Utc::now()) {
        Ok(receipt) => Ok(HttpResponse::Created().json(receipt)),
        Err(e) => {
            log::warn!("Rejected reading for {}: {}", chamber, e);
            Err(e)
        }
    }
}

/// Device self-check: expected payload and the newest stored reading
#[get("/{ch}/readings")]
pub async fn ingest_info(
    store: web::Data<dyn ReadingStore>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let service = IngestService::new(store.get_ref(), config.timezone);
    let (chamber, last) = service.last(&path.into_inner())?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "chamber": chamber,
        "expect_json_fields": REQUIRED_FIELDS,
        "hint": "POST JSON to this URL with Content-Type: application/json",
        "last": last,
    })))
}

/// Down-sampled rows; all readings when no window is given
#[get("/{ch}/range")]
pub async fn range_rows(
    store: web::Data<dyn ReadingStore>,
    gate: web::Data<dyn AccessGate>,
    config: web::Data<AppConfig>,
    claims: Claims,
    path: web::Path<String>,
    params: web::Query<RangeParams>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id()?;
    let chamber = path.into_inner();
    let newest_first = params.newest_first()?;

    let service = RangeQueryService::new(store.get_ref(), gate.get_ref(), config.timezone);
    let mut rows = service.get_range(user_id, &params.to_query(&chamber))?.rows;

    // Presentation order only; the service always yields ascending rows.
    if newest_first {
        rows.reverse();
    }

    Ok(HttpResponse::Ok().json(rows))
}

/// Column-oriented series for the chart page
#[get("/{ch}/chart")]
pub async fn chart_data(
    store: web::Data<dyn ReadingStore>,
    gate: web::Data<dyn AccessGate>,
    config: web::Data<AppConfig>,
    claims: Claims,
    path: web::Path<String>,
    params: web::Query<ChartParams>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id()?;
    let chamber = path.into_inner();
    let query = RangeQuery {
        chamber: &chamber,
        every: params.every.as_deref(),
        ..Default::default()
    };

    let service = RangeQueryService::new(store.get_ref(), gate.get_ref(), config.timezone);
    let result = service.get_range(user_id, &query)?;

    Ok(HttpResponse::Ok().json(ChartSeries::from_rows(&result.rows)))
}

#[get("/{ch}/export.csv")]
pub async fn download_csv(
    store: web::Data<dyn ReadingStore>,
    gate: web::Data<dyn AccessGate>,
    config: web::Data<AppConfig>,
    claims: Claims,
    path: web::Path<String>,
    params: web::Query<RangeParams>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id()?;
    let chamber = path.into_inner();

    let service = RangeQueryService::new(store.get_ref(), gate.get_ref(), config.timezone);
    let result = service.get_export(user_id, &params.to_query(&chamber))?;
    let every = span_label(result.step);

    let bytes = render_csv(&result.rows)?;
    log::info!("CSV export for {}: {} rows", result.chamber, result.rows.len());

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(attachment(&export_filename(&result, &every, "csv")))
        .body(bytes))
}

#[get("/{ch}/export.pdf")]
pub async fn download_pdf(
    store: web::Data<dyn ReadingStore>,
    gate: web::Data<dyn AccessGate>,
    config: web::Data<AppConfig>,
    claims: Claims,
    path: web::Path<String>,
    params: web::Query<RangeParams>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id()?;
    let chamber = path.into_inner();

    let service = RangeQueryService::new(store.get_ref(), gate.get_ref(), config.timezone);
    let result = service.get_export(user_id, &params.to_query(&chamber))?;
    let every = span_label(result.step);

    let bytes = render_pdf(result.chamber, &every, &result.rows)?;
    log::info!("PDF export for {}: {} rows", result.chamber, result.rows.len());

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(attachment(&export_filename(&result, &every, "pdf")))
        .body(bytes))
}

/// Malformed query strings answer with the same `{"error": ...}` body as
/// every other validation failure.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| {
        log::warn!("Bad query on {}: {}", req.path(), err);
        ServiceError::Validation(format!("Invalid query: {}", err)).into()
    })
}

fn attachment(filename: &str) -> (header::HeaderName, String) {
    (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", filename),
    )
}

// ============================================================================
// Tests
// ============================================================================
