pub mod mailer;
pub mod recipient_cache;
pub mod reminder;
pub mod sql_update;
pub mod timerange;
