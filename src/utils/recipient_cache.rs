use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

/// business_unit -> admin e-mail addresses. Reminder sweeps hit this on
/// every record, so the lookup is cached with a short TTL instead of
/// re-querying per asset date.
pub static ADMIN_RECIPIENTS: Lazy<Cache<String, Arc<Vec<String>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(600)) // 10 min TTL
        .build()
});

const ADMIN_EMAILS_SQL: &str = r#"
    SELECT e.business_unit, e.email
    FROM employees e
    INNER JOIN users u ON u.employee_id = e.id
    WHERE u.role_id = 1
      AND u.is_active = TRUE
    ORDER BY e.business_unit
"#;

/// Admin addresses for one business unit, cache-first.
pub async fn admin_emails(pool: &MySqlPool, business_unit: &str) -> Result<Arc<Vec<String>>> {
    if let Some(hit) = ADMIN_RECIPIENTS.get(business_unit).await {
        return Ok(hit);
    }

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT e.email
        FROM employees e
        INNER JOIN users u ON u.employee_id = e.id
        WHERE u.role_id = 1
          AND u.is_active = TRUE
          AND e.business_unit = ?
        "#,
    )
    .bind(business_unit)
    .fetch_all(pool)
    .await?;

    let emails = Arc::new(rows.into_iter().map(|(email,)| email).collect::<Vec<_>>());
    ADMIN_RECIPIENTS
        .insert(business_unit.to_string(), emails.clone())
        .await;

    Ok(emails)
}

/// Drop a unit's cached recipients (called when employees/users change).
pub async fn invalidate(business_unit: &str) {
    ADMIN_RECIPIENTS.invalidate(business_unit).await;
}

/// Pre-load admin recipients for every business unit (streamed, grouped).
pub async fn warmup_recipient_cache(pool: &MySqlPool) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, String)>(ADMIN_EMAILS_SQL).fetch(pool);

    let mut current_unit: Option<String> = None;
    let mut batch: Vec<String> = Vec::new();
    let mut total = 0usize;
    let mut units = 0usize;

    while let Some(row) = stream.next().await {
        let (unit, email) = row?;
        total += 1;

        match &current_unit {
            Some(u) if *u == unit => batch.push(email),
            _ => {
                if let Some(u) = current_unit.take() {
                    ADMIN_RECIPIENTS.insert(u, Arc::new(std::mem::take(&mut batch))).await;
                    units += 1;
                }
                current_unit = Some(unit);
                batch.push(email);
            }
        }
    }

    if let Some(u) = current_unit {
        ADMIN_RECIPIENTS.insert(u, Arc::new(batch)).await;
        units += 1;
    }

    log::info!(
        "Admin recipient cache warmup complete: {} addresses across {} business units",
        total,
        units
    );

    Ok(())
}
