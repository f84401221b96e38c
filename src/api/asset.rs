use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use sqlx::prelude::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::utils::mailer::Mailer;
use crate::utils::reminder::{ReminderRule, SweepStats, run_reminder_sweep};

/* =========================
DTOs
========================= */

#[derive(Deserialize, ToSchema)]
pub struct CreateAssetDate {
    #[schema(example = "stockholm")]
    pub business_unit: String,
    #[schema(example = "vehicles")]
    pub category: String,
    #[schema(example = 42)]
    pub asset_id: u64,
    #[schema(example = "Truck AB-123")]
    pub asset_label: String,
    #[schema(example = "registration_expiry")]
    pub date_type: String,
    #[schema(example = "2026-06-30")]
    pub date_value: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AssetDateFilter {
    #[schema(example = "vehicles")]
    pub category: Option<String>,
    #[schema(example = "upcoming")]
    pub status: Option<String>,
    #[schema(example = "stockholm")]
    pub business_unit: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u64>,
    #[schema(example = 20)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct AssetDateResponse {
    pub id: u64,
    #[schema(example = "stockholm")]
    pub business_unit: String,
    #[schema(example = "vehicles")]
    pub category: String,
    pub asset_id: u64,
    #[schema(example = "Truck AB-123")]
    pub asset_label: String,
    #[schema(example = "registration_expiry")]
    pub date_type: String,
    #[schema(example = "2026-06-30", format = "date", value_type = String)]
    pub date_value: NaiveDate,
    #[schema(example = "upcoming")]
    pub status: String,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct AssetDateListResponse {
    pub data: Vec<AssetDateResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/* =========================
Track a new asset date (admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/assets/dates",
    request_body = CreateAssetDate,
    responses(
        (status = 201, description = "Asset date tracked"),
        (status = 400, description = "Invalid date"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn create_asset_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAssetDate>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date_value = match NaiveDate::parse_from_str(&payload.date_value, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": format!("Invalid date '{}', expected YYYY-MM-DD", payload.date_value)
            })));
        }
    };

    // already-past dates start life overdue so escalations pick them up
    let status = if date_value < Local::now().date_naive() {
        "overdue"
    } else {
        "upcoming"
    };

    sqlx::query(
        r#"
        INSERT INTO asset_dates
            (business_unit, category, asset_id, asset_label, date_type, date_value, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.business_unit)
    .bind(&payload.category)
    .bind(payload.asset_id)
    .bind(&payload.asset_label)
    .bind(&payload.date_type)
    .bind(date_value)
    .bind(status)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create asset date");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Asset date tracked",
        "status": status
    })))
}

/* =========================
List tracked dates
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/assets/dates",
    params(AssetDateFilter),
    responses(
        (status = 200, description = "Paginated asset date list", body = AssetDateListResponse),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn list_asset_dates(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssetDateFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = query.per_page.unwrap_or(20).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<&str> = Vec::new();

    if let Some(category) = query.category.as_deref() {
        where_sql.push_str(" AND category = ?");
        args.push(category);
    }
    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(status);
    }
    if let Some(unit) = query.business_unit.as_deref() {
        where_sql.push_str(" AND business_unit = ?");
        args.push(unit);
    }

    let count_sql = format!("SELECT COUNT(*) FROM asset_dates{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(*arg);
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count asset dates");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, business_unit, category, asset_id, asset_label,
               date_type, date_value, status, created_at
        FROM asset_dates
        {}
        ORDER BY date_value ASC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, AssetDateResponse>(&data_sql);
    for arg in &args {
        data_q = data_q.bind(*arg);
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch asset dates");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(AssetDateListResponse {
        data: rows,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Resolve a date (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/assets/dates/{date_id}/resolve",
    params(
        ("date_id" = u64, Path, description = "Asset date ID")
    ),
    responses(
        (status = 200, description = "Asset date resolved"),
        (status = 400, description = "Already resolved or not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn resolve_asset_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE asset_dates
        SET status = 'resolved'
        WHERE id = ?
          AND status != 'resolved'
        "#,
    )
    .bind(date_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, date_id, "Failed to resolve asset date");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Asset date not found or already resolved"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Asset date resolved"
    })))
}

/* =========================
Manual sweep trigger (admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/assets/reminders/run",
    responses(
        (status = 200, description = "Sweep finished", body = SweepStats),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn run_reminders_now(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    rules: web::Data<Vec<ReminderRule>>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = Local::now().date_naive();
    let stats = run_reminder_sweep(pool.get_ref(), &mailer, &rules, today).await;

    Ok(HttpResponse::Ok().json(stats))
}
