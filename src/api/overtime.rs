use crate::auth::auth::AuthUser;
use crate::model::leave_request::RequestStatus;
use crate::utils::mailer::{Mailer, notify_employee};
use crate::utils::timerange::{parse_hhmm, validate_window, window_hours, windows_overlap};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

/* =========================
Overlap detection
========================= */

/// An already-filed overtime slot, as the conflict check sees it.
#[derive(Debug, Clone)]
pub struct ExistingOvertime {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: RequestStatus,
}

/// True when the candidate slot clashes with any active overtime on the
/// same calendar day. Touching boundaries are fine; the windows follow
/// the same open-interval rule as half-day leave.
pub fn overtime_conflicts(
    date: NaiveDate,
    window: (u16, u16),
    existing: &[ExistingOvertime],
) -> bool {
    existing.iter().any(|ex| {
        if !ex.status.is_active() || ex.date != date {
            return false;
        }
        match (parse_hhmm(&ex.start_time), parse_hhmm(&ex.end_time)) {
            (Ok(s), Ok(e)) => windows_overlap(window, (s, e)),
            // broken stored times block the whole day conservatively
            _ => true,
        }
    })
}

const SUBMIT_CONFLICT_MSG: &str =
    "You already have a pending or approved overtime request in this time window";
const APPROVE_CONFLICT_MSG: &str =
    "Cannot approve: another pending or approved overtime request now overlaps this window";

/* =========================
DTOs
========================= */

#[derive(Deserialize, ToSchema)]
pub struct CreateOvertime {
    #[schema(example = "2026-01-05")]
    pub date: String,
    #[schema(example = "17:00")]
    pub start_time: String,
    #[schema(example = "20:30")]
    pub end_time: String,
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectOvertime {
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct OvertimeFilter {
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    pub status: Option<String>,
    #[schema(example = "stockholm")]
    pub business_unit: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u64>,
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct OvertimeResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "stockholm")]
    pub business_unit: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "17:00")]
    pub start_time: String,
    #[schema(example = "20:30")]
    pub end_time: String,
    #[schema(example = 3.5)]
    pub hours: f64,
    #[schema(example = "pending")]
    pub status: Option<String>,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct OvertimeListResponse {
    pub data: Vec<OvertimeResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(FromRow)]
struct OvertimeRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    status: String,
}

async fn load_existing(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    exclude_id: Option<u64>,
) -> Result<Vec<ExistingOvertime>, sqlx::Error> {
    let rows: Vec<OvertimeRow> = sqlx::query_as(
        r#"
        SELECT id, employee_id, date, start_time, end_time, status
        FROM overtime_requests
        WHERE employee_id = ?
          AND date = ?
          AND id != ?
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(exclude_id.unwrap_or(0))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let status: RequestStatus = r.status.parse().ok()?;
            Some(ExistingOvertime {
                date: r.date,
                start_time: r.start_time,
                end_time: r.end_time,
                status,
            })
        })
        .collect())
}

/* =========================
Create overtime request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/overtime",
    request_body = CreateOvertime,
    responses(
        (status = 200, description = "Overtime request submitted", body = Object, example = json!({
            "message": "Overtime request submitted",
            "status": "pending",
            "hours": 3.5
        })),
        (status = 400, description = "Validation failed or overlapping request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn create_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateOvertime>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;
    let business_unit = auth
        .business_unit
        .clone()
        .ok_or_else(|| actix_web::error::ErrorForbidden("No business unit"))?;

    // 1️⃣ validate date and window
    let date = match NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": format!("Invalid date '{}', expected YYYY-MM-DD", payload.date)
            })));
        }
    };

    let window = match validate_window(&payload.start_time, &payload.end_time) {
        Ok(w) => w,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": e.to_string()
            })));
        }
    };

    // hours come from the same parse the conflict check uses
    let hours = window_hours(window.0, window.1);

    // 2️⃣ conflict check for that day
    let existing = load_existing(pool.get_ref(), employee_id, date, None)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to load existing overtime");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if overtime_conflicts(date, window, &existing) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": SUBMIT_CONFLICT_MSG
        })));
    }

    // 3️⃣ insert request
    sqlx::query(
        r#"
        INSERT INTO overtime_requests
            (employee_id, business_unit, date, start_time, end_time, hours, status, reason)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(employee_id)
    .bind(&business_unit)
    .bind(date)
    .bind(&payload.start_time)
    .bind(&payload.end_time)
    .bind(hours)
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create overtime request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Overtime request submitted",
        "status": "pending",
        "hours": hours
    })))
}

/* =========================
Approve overtime (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/overtime/{overtime_id}/approve",
    params(
        ("overtime_id" = u64, Path, description = "ID of the overtime request to approve")
    ),
    responses(
        (status = 200, description = "Overtime approved", body = Object, example = json!({
            "message": "Overtime approved"
        })),
        (status = 400, description = "Not pending, not found, or overlap found at approval time"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn approve_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let overtime_id = path.into_inner();

    let row: Option<OvertimeRow> = sqlx::query_as(
        r#"
        SELECT id, employee_id, date, start_time, end_time, status
        FROM overtime_requests
        WHERE id = ?
        "#,
    )
    .bind(overtime_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, overtime_id, "Failed to fetch overtime request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(row) = row else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Overtime request not found or already processed"
        })));
    };

    if row.status != RequestStatus::Pending.to_string() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Overtime request not found or already processed"
        })));
    }

    // Overlap is re-checked at approval: other slots may have been
    // approved since submission.
    let window = match (parse_hhmm(&row.start_time), parse_hhmm(&row.end_time)) {
        (Ok(s), Ok(e)) => (s, e),
        _ => {
            tracing::error!(overtime_id, "Stored overtime window is unparseable");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Overtime request has invalid stored times"
            })));
        }
    };

    let existing = load_existing(pool.get_ref(), row.employee_id, row.date, Some(overtime_id))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, overtime_id, "Failed to load existing overtime");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if overtime_conflicts(row.date, window, &existing) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": APPROVE_CONFLICT_MSG
        })));
    }

    let result = sqlx::query(
        r#"
        UPDATE overtime_requests
        SET status = 'approved',
            approved_at = NOW(),
            rejected_at = NULL,
            rejection_reason = NULL
        WHERE id = ?
          AND status = 'pending'
        "#,
    )
    .bind(row.id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, overtime_id, "Approve overtime failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Overtime request not found or already processed"
        })));
    }

    notify_employee(
        pool.get_ref(),
        &mailer,
        row.employee_id,
        "Overtime request approved",
        &format!(
            "Your overtime on {} ({}-{}) has been approved.",
            row.date, row.start_time, row.end_time
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Overtime approved"
    })))
}

/* =========================
Reject overtime (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/overtime/{overtime_id}/reject",
    params(
        ("overtime_id" = u64, Path, description = "ID of the overtime request to reject")
    ),
    request_body = RejectOvertime,
    responses(
        (status = 200, description = "Overtime rejected", body = Object, example = json!({
            "message": "Overtime rejected"
        })),
        (status = 400, description = "Overtime request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn reject_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
    body: web::Json<RejectOvertime>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let overtime_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE overtime_requests
        SET status = 'rejected',
            rejected_at = NOW(),
            rejection_reason = ?,
            approved_at = NULL
        WHERE id = ?
          AND status = 'pending'
        "#,
    )
    .bind(&body.reason)
    .bind(overtime_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, overtime_id, "Reject overtime failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Overtime request not found or already processed"
        })));
    }

    if let Ok(Some((employee_id,))) =
        sqlx::query_as::<_, (u64,)>("SELECT employee_id FROM overtime_requests WHERE id = ?")
            .bind(overtime_id)
            .fetch_optional(pool.get_ref())
            .await
    {
        notify_employee(
            pool.get_ref(),
            &mailer,
            employee_id,
            "Overtime request rejected",
            body.reason.as_deref().unwrap_or("Your overtime request was rejected."),
        )
        .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Overtime rejected"
    })))
}

/* =========================
Cancel overtime (employee)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/overtime/{overtime_id}/cancel",
    params(
        ("overtime_id" = u64, Path, description = "ID of the overtime request to cancel")
    ),
    responses(
        (status = 200, description = "Overtime cancelled", body = Object, example = json!({
            "message": "Overtime cancelled"
        })),
        (status = 400, description = "Overtime request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn cancel_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;

    let overtime_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE overtime_requests
        SET status = 'cancelled',
            cancelled_at = NOW()
        WHERE id = ?
          AND employee_id = ?
          AND status = 'pending'
        "#,
    )
    .bind(overtime_id)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, overtime_id, "Cancel overtime failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Overtime request not found or already processed"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Overtime cancelled"
    })))
}

/// overtime request details endpoint
#[utoipa::path(
    get,
    path = "/api/v1/overtime/{overtime_id}",
    params(
        ("overtime_id" = u64, Path, description = "ID of the overtime request to fetch")
    ),
    responses(
        (status = 200, description = "Overtime request found", body = OvertimeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Overtime request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn get_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let overtime_id = path.into_inner();

    let overtime = sqlx::query_as::<_, OvertimeResponse>(
        r#"
        SELECT id, employee_id, business_unit, date, start_time, end_time,
               hours, status, reason, rejection_reason, created_at
        FROM overtime_requests
        WHERE id = ?
        "#,
    )
    .bind(overtime_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, overtime_id, "Failed to fetch overtime request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match overtime {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Overtime request not found"
        }))),
    }
}

/// overtime request listing endpoint
#[utoipa::path(
    get,
    path = "/api/v1/overtime",
    params(OvertimeFilter),
    responses(
        (status = 200, description = "Paginated overtime list", body = OvertimeListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn overtime_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OvertimeFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    if let Some(unit) = query.business_unit.as_deref() {
        where_sql.push_str(" AND business_unit = ?");
        args.push(FilterValue::Str(unit));
    }

    let count_sql = format!("SELECT COUNT(*) FROM overtime_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error=%e, "Failed to count overtime requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, business_unit, date, start_time, end_time,
               hours, status, reason, rejection_reason, created_at
        FROM overtime_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, OvertimeResponse>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error=%e, "Failed to fetch overtime list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(OvertimeListResponse {
        data: rows,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn slot(date: &str, from: &str, to: &str, status: RequestStatus) -> ExistingOvertime {
        ExistingOvertime {
            date: day(date),
            start_time: from.to_string(),
            end_time: to.to_string(),
            status,
        }
    }

    fn window(from: &str, to: &str) -> (u16, u16) {
        validate_window(from, to).unwrap()
    }

    #[test]
    fn touching_slots_on_same_day_do_not_conflict() {
        // A: 09:00-12:00 pending; B: 12:00-15:00 same day -> no overlap
        let existing = [slot("2024-03-10", "09:00", "12:00", RequestStatus::Pending)];
        assert!(!overtime_conflicts(
            day("2024-03-10"),
            window("12:00", "15:00"),
            &existing
        ));
    }

    #[test]
    fn intersecting_slots_on_same_day_conflict() {
        let existing = [slot("2024-03-10", "09:00", "12:00", RequestStatus::Approved)];
        assert!(overtime_conflicts(
            day("2024-03-10"),
            window("11:00", "14:00"),
            &existing
        ));
        assert!(overtime_conflicts(
            day("2024-03-10"),
            window("10:00", "11:00"),
            &existing
        ));
    }

    #[test]
    fn other_days_never_conflict() {
        let existing = [slot("2024-03-10", "09:00", "12:00", RequestStatus::Approved)];
        assert!(!overtime_conflicts(
            day("2024-03-11"),
            window("09:00", "12:00"),
            &existing
        ));
    }

    #[test]
    fn inactive_slots_never_conflict() {
        for status in [RequestStatus::Rejected, RequestStatus::Cancelled] {
            let existing = [slot("2024-03-10", "09:00", "12:00", status)];
            assert!(!overtime_conflicts(
                day("2024-03-10"),
                window("09:00", "12:00"),
                &existing
            ));
        }
    }

    #[test]
    fn broken_stored_times_block_the_day() {
        let existing = [slot("2024-03-10", "09:00", "oops", RequestStatus::Approved)];
        assert!(overtime_conflicts(
            day("2024-03-10"),
            window("13:00", "15:00"),
            &existing
        ));
    }

    #[test]
    fn derived_hours_match_the_window() {
        let (s, e) = window("17:00", "20:30");
        assert_eq!(window_hours(s, e), 3.5);

        let (s, e) = window("09:00", "10:40");
        assert_eq!(window_hours(s, e), 1.67);
    }
}
