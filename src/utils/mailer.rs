use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sqlx::MySqlPool;

use crate::config::Config;

/// Thin `send(to, subject, body)` collaborator. When SMTP is not
/// configured the mailer degrades to log-only so local setups and tests
/// never need a relay.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let (host, from) = match (config.smtp_host.as_deref(), config.smtp_from.as_deref()) {
            (Some(h), Some(f)) => (h, f),
            _ => {
                tracing::warn!("SMTP not configured; outgoing mail will only be logged");
                return Self { transport: None, from: None };
            }
        };

        let from: Mailbox = match from.parse() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Invalid SMTP_FROM address; mail disabled");
                return Self { transport: None, from: None };
            }
        };

        let mut builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
            Ok(b) => b.port(config.smtp_port),
            Err(e) => {
                tracing::error!(error = %e, host, "Failed to build SMTP transport; mail disabled");
                return Self { transport: None, from: None };
            }
        };

        if let (Some(user), Some(pass)) =
            (config.smtp_username.clone(), config.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Self {
            transport: Some(builder.build()),
            from: Some(from),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::info!(to, subject, "mail delivery disabled, logging instead");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to.parse().with_context(|| format!("invalid recipient '{to}'"))?)
            .subject(subject)
            .body(body.to_string())
            .context("failed to build message")?;

        transport
            .send(message)
            .await
            .with_context(|| format!("SMTP send to '{to}' failed"))?;

        Ok(())
    }
}

/// Best-effort decision notification. A missing address or a failed
/// send is logged and swallowed; notifications never fail a handler.
pub async fn notify_employee(
    pool: &MySqlPool,
    mailer: &Mailer,
    employee_id: u64,
    subject: &str,
    body: &str,
) {
    let email = match sqlx::query_as::<_, (String,)>("SELECT email FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
    {
        Ok(Some((email,))) => email,
        Ok(None) => {
            tracing::warn!(employee_id, "No employee record for notification");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Failed to look up employee e-mail");
            return;
        }
    };

    if let Err(e) = mailer.send(&email, subject, body).await {
        tracing::error!(error = %e, employee_id, "Notification send failed");
    }
}
