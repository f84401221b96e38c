use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use crate::model::asset::AssetDateStatus;
use crate::utils::mailer::Mailer;
use crate::utils::recipient_cache;

/// Reminder policy for one `(category, date_type)` pair. Offsets are a
/// sparse schedule: a notice fires only on the exact day the distance to
/// the due date equals one of them, never on the days in between.
#[derive(Debug, Clone)]
pub struct ReminderRule {
    pub category: String,
    pub date_type: String,
    /// Days before due date on which to fire (e.g. [60, 30, 7, 2]).
    pub offsets: Vec<i64>,
    /// Fire every Nth day overdue when set.
    pub escalation_interval: Option<i64>,
}

impl ReminderRule {
    pub fn new(
        category: &str,
        date_type: &str,
        offsets: &[i64],
        escalation_interval: Option<i64>,
    ) -> Self {
        Self {
            category: category.to_string(),
            date_type: date_type.to_string(),
            offsets: offsets.to_vec(),
            escalation_interval,
        }
    }

    pub fn max_offset(&self) -> i64 {
        self.offsets.iter().copied().max().unwrap_or(0)
    }

    pub fn escalation_due(&self, days_overdue: i64) -> bool {
        match self.escalation_interval {
            Some(interval) if interval > 0 => days_overdue > 0 && days_overdue % interval == 0,
            _ => false,
        }
    }
}

/// The shipped policy table. Built once in `main` and passed into every
/// sweep so tests can substitute synthetic rules.
pub fn default_rules() -> Vec<ReminderRule> {
    vec![
        ReminderRule::new("vehicles", "registration_expiry", &[60, 30, 7, 2], Some(1)),
        ReminderRule::new("vehicles", "insurance_expiry", &[30, 14, 7], Some(1)),
        ReminderRule::new("registrations", "renewal_due", &[60, 30, 7], Some(3)),
        ReminderRule::new("rental_machines", "rental_end", &[30, 14, 7, 2], Some(1)),
        ReminderRule::new("it_equipment", "warranty_expiry", &[30, 7], None),
    ]
}

/// Just enough of an asset date for the planning decision.
#[derive(Debug, Clone)]
pub struct TrackedDate {
    pub id: u64,
    pub date_value: NaiveDate,
    pub status: AssetDateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReminder {
    pub asset_date_id: u64,
    /// Positive = days before due, negative = days overdue. Together
    /// with the asset-date id this is the at-most-once key.
    pub offset_days: i64,
    pub is_overdue_escalation: bool,
}

/// Decide whether a reminder is due for `date` on `today`. Pure; the
/// de-duplication against already-sent keys happens at the storage layer.
pub fn plan_reminder(
    rule: &ReminderRule,
    date: &TrackedDate,
    today: NaiveDate,
) -> Option<PlannedReminder> {
    match date.status {
        AssetDateStatus::Upcoming => {
            let days_until = date.date_value.signed_duration_since(today).num_days();
            if days_until < 0 || !rule.offsets.contains(&days_until) {
                return None;
            }
            Some(PlannedReminder {
                asset_date_id: date.id,
                offset_days: days_until,
                is_overdue_escalation: false,
            })
        }
        AssetDateStatus::Overdue => {
            let days_overdue = today.signed_duration_since(date.date_value).num_days();
            if !rule.escalation_due(days_overdue) {
                return None;
            }
            Some(PlannedReminder {
                asset_date_id: date.id,
                offset_days: -days_overdue,
                is_overdue_escalation: true,
            })
        }
        AssetDateStatus::Resolved => None,
    }
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize, utoipa::ToSchema)]
pub struct SweepStats {
    pub sent: u32,
    pub already_sent: u32,
    pub skipped_no_recipients: u32,
    pub failed: u32,
}

#[derive(sqlx::FromRow)]
struct DateRow {
    id: u64,
    business_unit: String,
    asset_label: String,
    date_value: NaiveDate,
    status: String,
}

/// One scheduler run for an explicit `today`. Each rule batch is
/// independent: a failure in one category is logged and the sweep moves
/// on to the next.
pub async fn run_reminder_sweep(
    pool: &MySqlPool,
    mailer: &Mailer,
    rules: &[ReminderRule],
    today: NaiveDate,
) -> SweepStats {
    let mut stats = SweepStats::default();

    // Past-due rows graduate before any planning happens.
    if let Err(e) = sqlx::query(
        "UPDATE asset_dates SET status = 'overdue' WHERE status = 'upcoming' AND date_value < ?",
    )
    .bind(today)
    .execute(pool)
    .await
    {
        error!(error = %e, "Failed to mark overdue asset dates");
    }

    for rule in rules {
        match sweep_rule(pool, mailer, rule, today).await {
            Ok(rule_stats) => {
                stats.sent += rule_stats.sent;
                stats.already_sent += rule_stats.already_sent;
                stats.skipped_no_recipients += rule_stats.skipped_no_recipients;
                stats.failed += rule_stats.failed;
            }
            Err(e) => {
                error!(
                    error = %e,
                    category = %rule.category,
                    date_type = %rule.date_type,
                    "Reminder batch failed; continuing with next rule"
                );
                stats.failed += 1;
            }
        }
    }

    info!(
        sent = stats.sent,
        already_sent = stats.already_sent,
        skipped = stats.skipped_no_recipients,
        failed = stats.failed,
        %today,
        "Reminder sweep finished"
    );

    stats
}

async fn sweep_rule(
    pool: &MySqlPool,
    mailer: &Mailer,
    rule: &ReminderRule,
    today: NaiveDate,
) -> anyhow::Result<SweepStats> {
    let mut stats = SweepStats::default();

    let horizon_end = today + chrono::Duration::days(rule.max_offset());

    let rows: Vec<DateRow> = sqlx::query_as(
        r#"
        SELECT id, business_unit, asset_label, date_value, status
        FROM asset_dates
        WHERE category = ?
          AND date_type = ?
          AND (
                (status = 'upcoming' AND date_value BETWEEN ? AND ?)
             OR (status = 'overdue' AND date_value < ?)
          )
        "#,
    )
    .bind(&rule.category)
    .bind(&rule.date_type)
    .bind(today)
    .bind(horizon_end)
    .bind(today)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let status: AssetDateStatus = match row.status.parse() {
            Ok(s) => s,
            Err(_) => {
                error!(asset_date_id = row.id, status = %row.status, "Unknown asset date status");
                continue;
            }
        };

        let tracked = TrackedDate {
            id: row.id,
            date_value: row.date_value,
            status,
        };

        let Some(plan) = plan_reminder(rule, &tracked, today) else {
            continue;
        };

        let recipients = match recipient_cache::admin_emails(pool, &row.business_unit).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, business_unit = %row.business_unit, "Recipient lookup failed");
                stats.failed += 1;
                continue;
            }
        };

        if recipients.is_empty() {
            debug!(
                asset_date_id = row.id,
                business_unit = %row.business_unit,
                "No admin recipients, skipping reminder"
            );
            stats.skipped_no_recipients += 1;
            continue;
        }

        // Atomic claim on the (asset_date_id, offset) unique key: a
        // duplicate key means some run already sent this notice.
        let claim = sqlx::query(
            r#"
            INSERT INTO asset_reminders
                (asset_date_id, reminder_offset_days, is_overdue_escalation, sent_to, sent_at)
            VALUES (?, ?, ?, ?, NOW())
            "#,
        )
        .bind(plan.asset_date_id)
        .bind(plan.offset_days)
        .bind(plan.is_overdue_escalation)
        .bind(recipients.join(","))
        .execute(pool)
        .await;

        if let Err(e) = claim {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    stats.already_sent += 1;
                    continue;
                }
            }
            error!(error = %e, asset_date_id = row.id, "Failed to record reminder");
            stats.failed += 1;
            continue;
        }

        let (subject, body) = compose_mail(rule, &row, &plan);

        let mut delivered = 0usize;
        for to in recipients.iter() {
            match mailer.send(to, &subject, &body).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    error!(error = %e, to = %to, asset_date_id = row.id, "Reminder send failed");
                }
            }
        }

        if delivered == 0 {
            // Release the claim so the next sweep retries this key.
            let _ = sqlx::query(
                "DELETE FROM asset_reminders WHERE asset_date_id = ? AND reminder_offset_days = ?",
            )
            .bind(plan.asset_date_id)
            .bind(plan.offset_days)
            .execute(pool)
            .await;
            stats.failed += 1;
        } else {
            stats.sent += 1;
        }
    }

    Ok(stats)
}

fn compose_mail(rule: &ReminderRule, row: &DateRow, plan: &PlannedReminder) -> (String, String) {
    if plan.is_overdue_escalation {
        let days = -plan.offset_days;
        (
            format!("[OVERDUE] {} {} for {}", rule.category, rule.date_type, row.asset_label),
            format!(
                "{} for {} ({}) was due on {} and is now {} day(s) overdue. Please resolve it.",
                rule.date_type, row.asset_label, rule.category, row.date_value, days
            ),
        )
    } else {
        (
            format!("Upcoming {} for {}", rule.date_type, row.asset_label),
            format!(
                "{} for {} ({}) is due on {}, {} day(s) from now.",
                rule.date_type, row.asset_label, rule.category, row.date_value, plan.offset_days
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rule(offsets: &[i64], escalation: Option<i64>) -> ReminderRule {
        ReminderRule::new("vehicles", "registration_expiry", offsets, escalation)
    }

    fn date(id: u64, value: &str, status: AssetDateStatus) -> TrackedDate {
        TrackedDate {
            id,
            date_value: value.parse().unwrap(),
            status,
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn fires_only_on_exact_offsets() {
        let rule = rule(&[60, 30, 7, 2], None);
        let tracked = date(1, "2024-04-01", AssetDateStatus::Upcoming);

        // 30 days out: due
        let plan = plan_reminder(&rule, &tracked, day("2024-03-02")).unwrap();
        assert_eq!(plan.offset_days, 30);
        assert!(!plan.is_overdue_escalation);

        // 29 or 31 days out: sparse schedule, nothing fires
        assert!(plan_reminder(&rule, &tracked, day("2024-03-01")).is_none());
        assert!(plan_reminder(&rule, &tracked, day("2024-03-03")).is_none());
    }

    #[test]
    fn due_day_fires_only_with_zero_offset() {
        let tracked = date(1, "2024-04-01", AssetDateStatus::Upcoming);
        assert!(plan_reminder(&rule(&[7, 2], None), &tracked, day("2024-04-01")).is_none());

        let plan = plan_reminder(&rule(&[7, 0], None), &tracked, day("2024-04-01")).unwrap();
        assert_eq!(plan.offset_days, 0);
    }

    #[test]
    fn upcoming_past_due_does_not_fire() {
        // A stale 'upcoming' row past its date is graduated by the sweep,
        // not matched against positive offsets.
        let tracked = date(1, "2024-04-01", AssetDateStatus::Upcoming);
        assert!(plan_reminder(&rule(&[2, 0], Some(1)), &tracked, day("2024-04-03")).is_none());
    }

    #[test]
    fn escalation_fires_every_nth_day() {
        let rule = rule(&[7], Some(3));
        let tracked = date(9, "2024-04-01", AssetDateStatus::Overdue);

        let plan = plan_reminder(&rule, &tracked, day("2024-04-04")).unwrap();
        assert_eq!(plan.offset_days, -3);
        assert!(plan.is_overdue_escalation);

        assert!(plan_reminder(&rule, &tracked, day("2024-04-05")).is_none());
        assert!(plan_reminder(&rule, &tracked, day("2024-04-06")).is_none());
        let plan = plan_reminder(&rule, &tracked, day("2024-04-07")).unwrap();
        assert_eq!(plan.offset_days, -6);
    }

    #[test]
    fn overdue_without_interval_never_escalates() {
        let rule = rule(&[7], None);
        let tracked = date(9, "2024-04-01", AssetDateStatus::Overdue);
        assert!(plan_reminder(&rule, &tracked, day("2024-04-02")).is_none());
    }

    #[test]
    fn zero_days_overdue_never_escalates() {
        let rule = rule(&[], Some(1));
        let tracked = date(9, "2024-04-01", AssetDateStatus::Overdue);
        // days_overdue == 0 is not overdue yet
        assert!(plan_reminder(&rule, &tracked, day("2024-04-01")).is_none());
    }

    #[test]
    fn resolved_dates_are_ignored() {
        let rule = rule(&[0, 7], Some(1));
        let tracked = date(3, "2024-04-01", AssetDateStatus::Resolved);
        assert!(plan_reminder(&rule, &tracked, day("2024-03-25")).is_none());
        assert!(plan_reminder(&rule, &tracked, day("2024-04-10")).is_none());
    }

    #[test]
    fn second_run_with_recorded_claim_plans_nothing_new() {
        // The unique (asset_date_id, offset) key is what makes a rerun a
        // no-op; model it with a set of claimed keys.
        let rule = rule(&[30, 7], None);
        let dates = [
            date(1, "2024-04-01", AssetDateStatus::Upcoming),
            date(2, "2024-04-01", AssetDateStatus::Upcoming),
        ];
        let today = day("2024-03-25"); // 7 days out

        let mut claimed: HashSet<(u64, i64)> = HashSet::new();

        let first: Vec<_> = dates
            .iter()
            .filter_map(|d| plan_reminder(&rule, d, today))
            .filter(|p| claimed.insert((p.asset_date_id, p.offset_days)))
            .collect();
        assert_eq!(first.len(), 2);

        let second: Vec<_> = dates
            .iter()
            .filter_map(|d| plan_reminder(&rule, d, today))
            .filter(|p| claimed.insert((p.asset_date_id, p.offset_days)))
            .collect();
        assert!(second.is_empty());
    }

    #[test]
    fn default_rules_cover_every_category_once() {
        let rules = default_rules();
        let mut keys: Vec<(String, String)> = rules
            .iter()
            .map(|r| (r.category.clone(), r.date_type.clone()))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), rules.len());
        assert!(rules.iter().all(|r| r.max_offset() > 0));
    }
}
