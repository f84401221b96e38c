use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use sqlx::prelude::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::payroll::{PayrollStatus, compute_pay};
use crate::utils::mailer::{Mailer, notify_employee};

/// `YYYY-MM`, and a month that actually exists.
pub fn valid_period(period: &str) -> bool {
    period.len() == 7
        && NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d").is_ok()
}

/* =========================
DTOs
========================= */

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "2026-01")]
    pub period: String,

    #[schema(example = 50000.0)]
    pub base_salary: f64,

    #[schema(example = 5000.0)]
    pub allowances: f64,

    #[schema(example = 2000.0)]
    pub deductions: f64,

    pub notes: Option<String>,

    #[schema(example = "2026-01-25", value_type = String, format = "date", nullable = true)]
    pub payroll_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,

    #[schema(example = 6000.0)]
    pub allowances: Option<f64>,

    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,

    pub notes: Option<String>,

    #[schema(example = "2026-01-25", value_type = String, format = "date", nullable = true)]
    pub payroll_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct EmployeeRejectPayroll {
    #[schema(example = "Overtime hours are missing")]
    pub reason: String,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct PayrollResponse {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "stockholm")]
    pub business_unit: String,
    #[schema(example = "2026-01")]
    pub period: String,
    pub base_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub gross_pay: f64,
    pub net_pay: f64,
    #[schema(example = "generated")]
    pub status: String,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub payroll_date: Option<NaiveDate>,
    pub employee_rejection_reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,

    #[schema(example = "pending_signature")]
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(FromRow)]
struct PayrollStateRow {
    id: u64,
    employee_id: u64,
    status: String,
}

async fn fetch_state(
    pool: &MySqlPool,
    payroll_id: u64,
) -> actix_web::Result<Option<(PayrollStateRow, PayrollStatus)>> {
    let row: Option<PayrollStateRow> =
        sqlx::query_as("SELECT id, employee_id, status FROM payroll WHERE id = ?")
            .bind(payroll_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, payroll_id, "Failed to fetch payroll");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

    match row {
        None => Ok(None),
        Some(row) => {
            let status: PayrollStatus = row.status.parse().map_err(|_| {
                tracing::error!(payroll_id, status = %row.status, "Unknown payroll status");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;
            Ok(Some((row, status)))
        }
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "message": "Payroll record not found"
    }))
}

/* =========================
Create payroll (admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created"),
        (status = 400, description = "Invalid period or negative net pay"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if !valid_period(&payload.period) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": format!("Invalid period '{}', expected YYYY-MM", payload.period)
        })));
    }

    let (gross_pay, net_pay) =
        match compute_pay(payload.base_salary, payload.allowances, payload.deductions) {
            Ok(pair) => pair,
            Err(e) => {
                return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                    "message": e.to_string()
                })));
            }
        };

    // tenant comes from the employee record, not the payload
    let business_unit: Option<(String,)> =
        sqlx::query_as("SELECT business_unit FROM employees WHERE id = ?")
            .bind(payload.employee_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch employee");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

    let Some((business_unit,)) = business_unit else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Employee not found"
        })));
    };

    sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, business_unit, period, base_salary, allowances, deductions,
         gross_pay, net_pay, status, notes, payroll_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'generated', ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(&business_unit)
    .bind(&payload.period)
    .bind(payload.base_salary)
    .bind(payload.allowances)
    .bind(payload.deductions)
    .bind(gross_pay)
    .bind(net_pay)
    .bind(&payload.notes)
    .bind(payload.payroll_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Payroll created successfully",
        "status": "generated"
    })))
}

/* =========================
Edit monetary fields (admin)
========================= */
/// Allowed in every status, including completed: corrections must stay
/// possible. The derived pay is recomputed on each edit and the whole
/// update is rejected if net pay would go negative.
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated"),
        (status = 400, description = "Negative net pay"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();

    #[derive(FromRow)]
    struct MoneyRow {
        base_salary: f64,
        allowances: f64,
        deductions: f64,
    }

    let current: Option<MoneyRow> =
        sqlx::query_as("SELECT base_salary, allowances, deductions FROM payroll WHERE id = ?")
            .bind(payroll_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, payroll_id, "Failed to fetch payroll");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

    let Some(current) = current else {
        return Ok(not_found());
    };

    let base_salary = body.base_salary.unwrap_or(current.base_salary);
    let allowances = body.allowances.unwrap_or(current.allowances);
    let deductions = body.deductions.unwrap_or(current.deductions);

    let (gross_pay, net_pay) = match compute_pay(base_salary, allowances, deductions) {
        Ok(pair) => pair,
        Err(e) => {
            // nothing written; the stored record stays as it was
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": e.to_string()
            })));
        }
    };

    sqlx::query(
        r#"
        UPDATE payroll
        SET base_salary = ?, allowances = ?, deductions = ?,
            gross_pay = ?, net_pay = ?,
            notes = COALESCE(?, notes),
            payroll_date = COALESCE(?, payroll_date)
        WHERE id = ?
        "#,
    )
    .bind(base_salary)
    .bind(allowances)
    .bind(deductions)
    .bind(gross_pay)
    .bind(net_pay)
    .bind(&body.notes)
    .bind(body.payroll_date)
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to update payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll updated successfully",
        "net_pay": net_pay
    })))
}

/* =========================
Send for signature (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}/send",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll sent for signature"),
        (status = 400, description = "Illegal status transition"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn send_for_signature(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();

    let Some((row, status)) = fetch_state(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found());
    };

    if let Err(e) = status.check_transition(PayrollStatus::PendingSignature) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        })));
    }

    // a re-issue after employee rejection clears the old reason
    sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'pending_signature',
            employee_rejection_reason = NULL
        WHERE id = ?
          AND status = ?
        "#,
    )
    .bind(row.id)
    .bind(status.to_string())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to send payroll for signature");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    notify_employee(
        pool.get_ref(),
        &mailer,
        row.employee_id,
        "Payslip ready for signature",
        "A payslip is waiting for your signature in the portal.",
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll sent for signature"
    })))
}

/* =========================
Sign (employee)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}/sign",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll signed"),
        (status = 400, description = "Illegal status transition"),
        (status = 403, description = "Not your payroll record"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn sign_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;

    let payroll_id = path.into_inner();

    let Some((row, status)) = fetch_state(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found());
    };

    if row.employee_id != employee_id {
        return Err(actix_web::error::ErrorForbidden("Not your payroll record"));
    }

    if let Err(e) = status.check_transition(PayrollStatus::Signed) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        })));
    }

    sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'signed', signed_at = NOW()
        WHERE id = ?
          AND status = 'pending_signature'
        "#,
    )
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to sign payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll signed"
    })))
}

/* =========================
Reject (employee)
========================= */
/// Employee-side rejection, with its own reason field. Only a record
/// waiting for signature can be pushed back; signed or completed ones
/// cannot.
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}/reject",
    request_body = EmployeeRejectPayroll,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll rejected"),
        (status = 400, description = "Illegal status transition"),
        (status = 403, description = "Not your payroll record"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn reject_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<EmployeeRejectPayroll>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;

    let payroll_id = path.into_inner();

    if body.reason.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "A rejection reason is required"
        })));
    }

    let Some((row, status)) = fetch_state(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found());
    };

    if row.employee_id != employee_id {
        return Err(actix_web::error::ErrorForbidden("Not your payroll record"));
    }

    if let Err(e) = status.check_transition(PayrollStatus::Rejected) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        })));
    }

    sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'rejected', employee_rejection_reason = ?
        WHERE id = ?
          AND status = 'pending_signature'
        "#,
    )
    .bind(body.reason.trim())
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to reject payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll rejected"
    })))
}

/* =========================
Rework a rejected record (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}/rework",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll pulled back to generated"),
        (status = 400, description = "Illegal status transition"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn rework_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();

    let Some((_, status)) = fetch_state(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found());
    };

    if let Err(e) = status.check_transition(PayrollStatus::Generated) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        })));
    }

    sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'generated', employee_rejection_reason = NULL
        WHERE id = ?
          AND status = 'rejected'
        "#,
    )
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to rework payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll pulled back to generated"
    })))
}

/* =========================
Complete (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}/complete",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll completed (idempotent)"),
        (status = 400, description = "Illegal status transition"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn complete_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();

    let Some((row, status)) = fetch_state(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found());
    };

    if let Err(e) = status.check_transition(PayrollStatus::Completed) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": e.to_string()
        })));
    }

    // retried confirmation of an already-completed record is a no-op
    if status == PayrollStatus::Completed {
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Payroll completed"
        })));
    }

    sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'completed', completed_at = NOW()
        WHERE id = ?
          AND status = 'signed'
        "#,
    )
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to complete payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    notify_employee(
        pool.get_ref(),
        &mailer,
        row.employee_id,
        "Payslip completed",
        "Your signed payslip has been marked completed.",
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll completed"
    })))
}

/* =========================
Read endpoints
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = PayrollResponse),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payroll_id = path.into_inner();

    let payroll = sqlx::query_as::<_, PayrollResponse>(
        r#"
        SELECT id, employee_id, business_unit, period, base_salary, allowances,
               deductions, gross_pay, net_pay, status, notes, payroll_date,
               employee_rejection_reason
        FROM payroll
        WHERE id = ?
        "#,
    )
    .bind(payroll_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to fetch payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match payroll {
        Some(p) => {
            // employees may only read their own records
            if auth.is_employee() && auth.employee_id != Some(p.employee_id) {
                return Err(actix_web::error::ErrorForbidden("Not your payroll record"));
            }
            Ok(HttpResponse::Ok().json(p))
        }
        None => Ok(not_found()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    if query.employee_id.is_some() {
        where_sql.push_str(" AND employee_id = ?");
    }
    if query.status.is_some() {
        where_sql.push_str(" AND status = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM payroll{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(emp_id) = query.employee_id {
        count_q = count_q.bind(emp_id);
    }
    if let Some(status) = query.status.as_deref() {
        count_q = count_q.bind(status);
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count payrolls");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, business_unit, period, base_salary, allowances,
               deductions, gross_pay, net_pay, status, notes, payroll_date,
               employee_rejection_reason
        FROM payroll
        {}
        ORDER BY period DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, PayrollResponse>(&data_sql);
    if let Some(emp_id) = query.employee_id {
        data_q = data_q.bind(emp_id);
    }
    if let Some(status) = query.status.as_deref() {
        data_q = data_q.bind(status);
    }

    let data = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch payroll list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_real_periods() {
        assert!(valid_period("2026-01"));
        assert!(valid_period("1999-12"));
    }

    #[test]
    fn rejects_malformed_periods() {
        for period in ["2026-13", "2026-00", "2026-1", "202601", "2026/01", "jan-26", ""] {
            assert!(!valid_period(period), "{period:?} should be rejected");
        }
    }
}
