use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle of a tracked expiry/renewal date carved off an owning
/// asset (vehicle registration, insurance, rental end, warranty, ...).
/// `upcoming` rows graduate to `overdue` once the date passes; only an
/// admin resolves them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetDateStatus {
    Upcoming,
    Overdue,
    Resolved,
}
