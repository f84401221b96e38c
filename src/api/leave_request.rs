use crate::auth::auth::AuthUser;
use crate::model::leave_request::{LeaveType, LeaveUnit, RequestStatus};
use crate::utils::mailer::{Mailer, notify_employee};
use crate::utils::timerange::{TimeRangeError, parse_hhmm, validate_window, windows_overlap};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Local, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

/* =========================
Request-shape validation
========================= */

#[derive(Debug, Display, Clone, PartialEq)]
pub enum LeaveRuleError {
    #[display(fmt = "Invalid start date '{}', expected YYYY-MM-DD", _0)]
    InvalidDate(String),
    #[display(fmt = "Invalid leave range: {}", _0)]
    InvalidRange(&'static str),
    #[display(fmt = "Leave cannot start in the past")]
    BackdatedStart,
    #[display(fmt = "Start and end time are required for half-day leave")]
    MissingTime,
    #[display(fmt = "{}", _0)]
    InvalidTime(TimeRangeError),
}

/// Normalized candidate: effective end date filled in, half-day window
/// parsed to minutes. This is what the overlap check consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// `Some` only for half-day requests.
    pub window: Option<(u16, u16)>,
}

/// Validate a leave submission against `today` (injected so the rules
/// stay deterministic under test).
///
/// Sick leave may start in the past: employees report sickness after
/// the fact. Every other type must start today or later.
pub fn validate_leave_range(
    leave_type: LeaveType,
    unit: LeaveUnit,
    start_date: &str,
    end_date: Option<&str>,
    start_time: Option<&str>,
    end_time: Option<&str>,
    today: NaiveDate,
) -> Result<LeaveSpan, LeaveRuleError> {
    // 1️⃣ start date
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| LeaveRuleError::InvalidDate(start_date.to_string()))?;

    // 2️⃣ end date, defaulting to a single-day request
    let end = match end_date {
        Some(raw) => {
            let end = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| LeaveRuleError::InvalidRange("end date is not a valid date"))?;
            if end < start {
                return Err(LeaveRuleError::InvalidRange(
                    "end date cannot be before start date",
                ));
            }
            end
        }
        None => start,
    };

    // 3️⃣ no backdating except sick leave
    if !leave_type.allows_backdating() && start < today {
        return Err(LeaveRuleError::BackdatedStart);
    }

    // 4️⃣ half-day requests are single-day and carry a positive window
    let window = match unit {
        LeaveUnit::FullDay => None,
        LeaveUnit::HalfDay => {
            if end != start {
                return Err(LeaveRuleError::InvalidRange(
                    "a half-day request must start and end on the same day",
                ));
            }
            let (Some(st), Some(et)) = (start_time, end_time) else {
                return Err(LeaveRuleError::MissingTime);
            };
            Some(validate_window(st, et).map_err(LeaveRuleError::InvalidTime)?)
        }
    };

    Ok(LeaveSpan { start, end, window })
}

/* =========================
Overlap detection
========================= */

/// The slice of an existing request the conflict check needs.
#[derive(Debug, Clone)]
pub struct ExistingLeave {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub unit: LeaveUnit,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: RequestStatus,
}

/// Existence check, not an enumeration: true as soon as one active
/// request clashes with the candidate.
pub fn conflicts_with_existing(span: &LeaveSpan, existing: &[ExistingLeave]) -> bool {
    existing.iter().any(|ex| conflicts_with(span, ex))
}

fn conflicts_with(span: &LeaveSpan, ex: &ExistingLeave) -> bool {
    // rejected/cancelled requests never block
    if !ex.status.is_active() {
        return false;
    }

    let ex_end = ex.end_date.unwrap_or(ex.start_date);

    // inclusive date intersection; ranges touching on one day clash
    if !(span.start <= ex_end && span.end >= ex.start_date) {
        return false;
    }

    // a full-day side blocks the whole day whatever the other side is
    let (Some(cand_window), LeaveUnit::HalfDay) = (span.window, ex.unit) else {
        return true;
    };

    // both half-day: single-day by construction, so only the same start
    // day can clash
    if span.start != ex.start_date {
        return false;
    }

    let ex_window = match (ex.start_time.as_deref(), ex.end_time.as_deref()) {
        (Some(s), Some(e)) => match (parse_hhmm(s), parse_hhmm(e)) {
            (Ok(s), Ok(e)) => (s, e),
            // a stored half-day with broken times blocks conservatively
            _ => return true,
        },
        _ => return true,
    };

    windows_overlap(cand_window, ex_window)
}

const SUBMIT_CONFLICT_MSG: &str = "You already have a pending or approved leave request that overlaps this period";
const APPROVE_CONFLICT_MSG: &str =
    "Cannot approve: another pending or approved request now overlaps this period";

/* =========================
DTOs
========================= */

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    pub leave_type: LeaveType,
    pub unit: LeaveUnit,
    #[schema(example = "2026-01-05")]
    pub start_date: String,
    #[schema(example = "2026-01-07", nullable = true)]
    pub end_date: Option<String>,
    /// Required for half-day requests
    #[schema(example = "09:00", nullable = true)]
    pub start_time: Option<String>,
    #[schema(example = "12:00", nullable = true)]
    pub end_time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Team is at capacity that week")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// Filter by business unit
    #[schema(example = "stockholm")]
    pub business_unit: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    /// Pagination per page number
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "stockholm")]
    pub business_unit: String,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(example = "full_day")]
    pub unit: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String, nullable = true)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "09:00", nullable = true)]
    pub start_time: Option<String>,
    #[schema(example = "12:00", nullable = true)]
    pub end_time: Option<String>,
    #[schema(example = "pending")]
    pub status: Option<String>,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    unit: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    start_time: Option<String>,
    end_time: Option<String>,
    status: String,
}

/// Rows an employee already has on file, shaped for the conflict check.
async fn load_existing(
    pool: &MySqlPool,
    employee_id: u64,
    exclude_id: Option<u64>,
) -> Result<Vec<ExistingLeave>, sqlx::Error> {
    let rows: Vec<LeaveRow> = sqlx::query_as(
        r#"
        SELECT id, employee_id, unit, start_date, end_date,
               start_time, end_time, status
        FROM leave_requests
        WHERE employee_id = ?
          AND id != ?
        "#,
    )
    .bind(employee_id)
    .bind(exclude_id.unwrap_or(0))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            // unknown status strings are inert; unknown units block as
            // full days rather than silently passing
            let status: RequestStatus = r.status.parse().ok()?;
            let unit: LeaveUnit = r.unit.parse().unwrap_or(LeaveUnit::FullDay);
            Some(ExistingLeave {
                start_date: r.start_date,
                end_date: r.end_date,
                unit,
                start_time: r.start_time,
                end_time: r.end_time,
                status,
            })
        })
        .collect())
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "status": "pending"
         })
        ),
        (status = 400, description = "Validation failed or overlapping request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;
    let business_unit = auth
        .business_unit
        .clone()
        .ok_or_else(|| actix_web::error::ErrorForbidden("No business unit"))?;

    // 1️⃣ validate shape and dates
    let today = Local::now().date_naive();
    let span = match validate_leave_range(
        payload.leave_type,
        payload.unit,
        &payload.start_date,
        payload.end_date.as_deref(),
        payload.start_time.as_deref(),
        payload.end_time.as_deref(),
        today,
    ) {
        Ok(span) => span,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": e.to_string()
            })));
        }
    };

    // 2️⃣ conflict check against the employee's active requests
    let existing = load_existing(pool.get_ref(), employee_id, None)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to load existing leave");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if conflicts_with_existing(&span, &existing) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": SUBMIT_CONFLICT_MSG
        })));
    }

    // 3️⃣ insert request
    sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, business_unit, leave_type, unit, start_date, end_date,
             start_time, end_time, status, reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(employee_id)
    .bind(&business_unit)
    .bind(payload.leave_type.to_string())
    .bind(payload.unit.to_string())
    .bind(span.start)
    .bind(payload.end_date.as_ref().map(|_| span.end))
    .bind(&payload.start_time)
    .bind(&payload.end_time)
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request submitted",
        "status": "pending"
    })))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 400, description = "Not pending, not found, or overlap found at approval time"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let row: Option<LeaveRow> = sqlx::query_as(
        r#"
        SELECT id, employee_id, unit, start_date, end_date,
               start_time, end_time, status
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(row) = row else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    };

    if row.status != RequestStatus::Pending.to_string() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    }

    // Overlap is re-checked here: other requests may have been approved
    // since this one was submitted.
    let window = match (row.start_time.as_deref(), row.end_time.as_deref()) {
        (Some(s), Some(e)) => match (parse_hhmm(s), parse_hhmm(e)) {
            (Ok(s), Ok(e)) => Some((s, e)),
            _ => None, // broken stored times: treat as full-day
        },
        _ => None,
    };
    let span = LeaveSpan {
        start: row.start_date,
        end: row.end_date.unwrap_or(row.start_date),
        window: if row.unit == LeaveUnit::HalfDay.to_string() { window } else { None },
    };

    let existing = load_existing(pool.get_ref(), row.employee_id, Some(leave_id))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, leave_id, "Failed to load existing leave");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if conflicts_with_existing(&span, &existing) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": APPROVE_CONFLICT_MSG
        })));
    }

    // approval clears any earlier rejection metadata
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
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
        tracing::error!(error = %e, leave_id, "Approve leave failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    }

    notify_employee(
        pool.get_ref(),
        &mailer,
        row.employee_id,
        "Leave request approved",
        &format!("Your leave starting {} has been approved.", row.start_date),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave approved"
    })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
    body: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    // rejection clears any earlier approval metadata
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = 'rejected',
            rejected_at = NOW(),
            rejection_reason = ?,
            approved_at = NULL
        WHERE id = ?
          AND status = 'pending'
        "#,
    )
    .bind(&body.reason)
    .bind(leave_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Reject leave failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    }

    if let Ok(Some((employee_id,))) =
        sqlx::query_as::<_, (u64,)>("SELECT employee_id FROM leave_requests WHERE id = ?")
            .bind(leave_id)
            .fetch_optional(pool.get_ref())
            .await
    {
        notify_employee(
            pool.get_ref(),
            &mailer,
            employee_id,
            "Leave request rejected",
            body.reason.as_deref().unwrap_or("Your leave request was rejected."),
        )
        .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave rejected"
    })))
}

/* =========================
Cancel leave (employee)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave cancelled"
        })),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;

    let leave_id = path.into_inner();

    // only the owner can cancel, and only while still pending
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = 'cancelled',
            cancelled_at = NOW()
        WHERE id = ?
          AND employee_id = ?
          AND status = 'pending'
        "#,
    )
    .bind(leave_id)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Cancel leave failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave cancelled"
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let leave = sqlx::query_as::<_, LeaveResponse>(
        r#"
        SELECT
            id, employee_id, business_unit, leave_type, unit,
            start_date, end_date, start_time, end_time,
            status, reason, rejection_reason, created_at
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match leave {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Leave request not found"
        }))),
    }
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
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

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error=%e, "Failed to count leave requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, employee_id, business_unit, leave_type, unit,
               start_date, end_date, start_time, end_time,
               status, reason, rejection_reason, created_at
        FROM leave_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveResponse>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error=%e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // -------------------------
    // Response
    // -------------------------
    let response = LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn today() -> NaiveDate {
        day("2024-03-01")
    }

    fn full_day(start: &str, end: Option<&str>, status: RequestStatus) -> ExistingLeave {
        ExistingLeave {
            start_date: day(start),
            end_date: end.map(day),
            unit: LeaveUnit::FullDay,
            start_time: None,
            end_time: None,
            status,
        }
    }

    fn half_day(start: &str, from: &str, to: &str, status: RequestStatus) -> ExistingLeave {
        ExistingLeave {
            start_date: day(start),
            end_date: None,
            unit: LeaveUnit::HalfDay,
            start_time: Some(from.to_string()),
            end_time: Some(to.to_string()),
            status,
        }
    }

    fn span(start: &str, end: &str) -> LeaveSpan {
        LeaveSpan {
            start: day(start),
            end: day(end),
            window: None,
        }
    }

    fn half_span(date: &str, from: &str, to: &str) -> LeaveSpan {
        LeaveSpan {
            start: day(date),
            end: day(date),
            window: Some(validate_window(from, to).unwrap()),
        }
    }

    // ---- range validation ----

    #[test]
    fn valid_full_day_range_passes() {
        let span = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::FullDay,
            "2024-03-10",
            Some("2024-03-12"),
            None,
            None,
            today(),
        )
        .unwrap();
        assert_eq!(span.start, day("2024-03-10"));
        assert_eq!(span.end, day("2024-03-12"));
        assert_eq!(span.window, None);
    }

    #[test]
    fn missing_end_date_means_single_day() {
        let span = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::FullDay,
            "2024-03-10",
            None,
            None,
            None,
            today(),
        )
        .unwrap();
        assert_eq!(span.end, span.start);
    }

    #[test]
    fn garbage_start_date_is_invalid() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::FullDay,
            "10/03/2024",
            None,
            None,
            None,
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, LeaveRuleError::InvalidDate(_)));
    }

    #[test]
    fn reversed_range_is_invalid() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::FullDay,
            "2024-03-12",
            Some("2024-03-10"),
            None,
            None,
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, LeaveRuleError::InvalidRange(_)));
    }

    #[test]
    fn annual_leave_cannot_be_backdated() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::FullDay,
            "2024-02-28",
            None,
            None,
            None,
            today(),
        )
        .unwrap_err();
        assert_eq!(err, LeaveRuleError::BackdatedStart);
    }

    #[test]
    fn sick_leave_may_be_backdated() {
        for leave_type in [LeaveType::SickWithCertificate, LeaveType::SickWithoutCertificate] {
            assert!(
                validate_leave_range(
                    leave_type,
                    LeaveUnit::FullDay,
                    "2024-02-20",
                    Some("2024-02-22"),
                    None,
                    None,
                    today(),
                )
                .is_ok()
            );
        }
    }

    #[test]
    fn half_day_requires_both_times() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::HalfDay,
            "2024-03-10",
            None,
            Some("09:00"),
            None,
            today(),
        )
        .unwrap_err();
        assert_eq!(err, LeaveRuleError::MissingTime);
    }

    #[test]
    fn half_day_with_equal_times_is_invalid() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::HalfDay,
            "2024-03-10",
            None,
            Some("09:00"),
            Some("09:00"),
            today(),
        )
        .unwrap_err();
        assert_eq!(err, LeaveRuleError::InvalidTime(TimeRangeError::InvalidTime));
    }

    #[test]
    fn half_day_must_be_single_day() {
        let err = validate_leave_range(
            LeaveType::Annual,
            LeaveUnit::HalfDay,
            "2024-03-10",
            Some("2024-03-11"),
            Some("09:00"),
            Some("12:00"),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, LeaveRuleError::InvalidRange(_)));
    }

    // ---- overlap detection ----

    #[test]
    fn ranges_sharing_one_day_conflict() {
        // A: 03-10..03-12 approved; B: 03-12..03-14 -> shared day 03-12
        let existing = [full_day("2024-03-10", Some("2024-03-12"), RequestStatus::Approved)];
        assert!(conflicts_with_existing(&span("2024-03-12", "2024-03-14"), &existing));
    }

    #[test]
    fn disjoint_ranges_do_not_conflict() {
        let existing = [full_day("2024-03-10", Some("2024-03-12"), RequestStatus::Approved)];
        assert!(!conflicts_with_existing(&span("2024-03-13", "2024-03-14"), &existing));
    }

    #[test]
    fn inactive_requests_never_block() {
        for status in [RequestStatus::Rejected, RequestStatus::Cancelled] {
            let existing = [
                full_day("2024-03-10", Some("2024-03-12"), status),
                half_day("2024-03-10", "09:00", "12:00", status),
            ];
            assert!(!conflicts_with_existing(&span("2024-03-10", "2024-03-12"), &existing));
            assert!(!conflicts_with_existing(
                &half_span("2024-03-10", "10:00", "11:00"),
                &existing
            ));
        }
    }

    #[test]
    fn full_day_blocks_half_day_on_same_date() {
        let existing = [full_day("2024-03-10", None, RequestStatus::Pending)];
        assert!(conflicts_with_existing(
            &half_span("2024-03-10", "09:00", "12:00"),
            &existing
        ));

        // and the mirror: a half-day on file blocks a full-day candidate
        let existing = [half_day("2024-03-10", "09:00", "12:00", RequestStatus::Pending)];
        assert!(conflicts_with_existing(&span("2024-03-10", "2024-03-10"), &existing));
    }

    #[test]
    fn adjacent_half_days_do_not_conflict() {
        let existing = [half_day("2024-03-10", "09:00", "12:00", RequestStatus::Approved)];
        assert!(!conflicts_with_existing(
            &half_span("2024-03-10", "12:00", "15:00"),
            &existing
        ));
    }

    #[test]
    fn overlapping_half_days_conflict() {
        let existing = [half_day("2024-03-10", "09:00", "12:00", RequestStatus::Approved)];
        assert!(conflicts_with_existing(
            &half_span("2024-03-10", "11:00", "14:00"),
            &existing
        ));
    }

    #[test]
    fn half_days_on_different_days_do_not_conflict() {
        let existing = [half_day("2024-03-11", "09:00", "12:00", RequestStatus::Approved)];
        assert!(!conflicts_with_existing(
            &half_span("2024-03-10", "09:00", "12:00"),
            &existing
        ));
    }

    #[test]
    fn half_day_with_broken_stored_times_blocks() {
        let mut ex = half_day("2024-03-10", "09:00", "12:00", RequestStatus::Approved);
        ex.end_time = Some("nonsense".to_string());
        assert!(conflicts_with_existing(
            &half_span("2024-03-10", "13:00", "15:00"),
            &[ex]
        ));
    }
}
