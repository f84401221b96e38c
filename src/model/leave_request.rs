use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Annual,
    SickWithCertificate,
    SickWithoutCertificate,
}

impl LeaveType {
    /// Sick leave is reported after the fact, so it may be backdated.
    pub fn allows_backdating(&self) -> bool {
        matches!(
            self,
            LeaveType::SickWithCertificate | LeaveType::SickWithoutCertificate
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveUnit {
    FullDay,
    HalfDay,
}

/// Shared by leave and overtime requests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    /// Only pending and approved requests block other requests;
    /// rejected and cancelled ones are inert history.
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_type_round_trips_through_strings() {
        for leave_type in [
            LeaveType::Annual,
            LeaveType::SickWithCertificate,
            LeaveType::SickWithoutCertificate,
        ] {
            let parsed: LeaveType = leave_type.to_string().parse().unwrap();
            assert_eq!(parsed, leave_type);
        }
        assert_eq!(LeaveType::SickWithCertificate.to_string(), "sick_with_certificate");
    }

    #[test]
    fn only_sick_leave_allows_backdating() {
        assert!(!LeaveType::Annual.allows_backdating());
        assert!(LeaveType::SickWithCertificate.allows_backdating());
        assert!(LeaveType::SickWithoutCertificate.allows_backdating());
    }

    #[test]
    fn only_pending_and_approved_are_active() {
        assert!(RequestStatus::Pending.is_active());
        assert!(RequestStatus::Approved.is_active());
        assert!(!RequestStatus::Rejected.is_active());
        assert!(!RequestStatus::Cancelled.is_active());
    }
}
