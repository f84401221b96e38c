use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayrollStatus {
    Generated,
    PendingSignature,
    Rejected,
    Signed,
    Completed,
}

impl PayrollStatus {
    /// Legal lifecycle moves. `Completed -> Completed` is the single
    /// permitted same-state no-op so a retried confirmation stays 200.
    pub fn can_transition(self, to: PayrollStatus) -> bool {
        use PayrollStatus::*;
        matches!(
            (self, to),
            (Generated, PendingSignature)
                | (PendingSignature, Signed)
                | (PendingSignature, Rejected)
                | (Signed, Completed)
                | (Rejected, PendingSignature)
                | (Rejected, Generated)
                | (Completed, Completed)
        )
    }

    pub fn check_transition(self, to: PayrollStatus) -> Result<(), PayrollError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(PayrollError::InvalidTransition { from: self, to })
        }
    }
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum PayrollError {
    #[display(fmt = "Payroll status cannot change from '{}' to '{}'", from, to)]
    InvalidTransition { from: PayrollStatus, to: PayrollStatus },
    #[display(fmt = "Update rejected: net pay would be negative ({:.2})", _0)]
    NegativeNetPay(f64),
}

/// Recompute derived pay from the monetary fields. The whole update is
/// rejected when the result goes negative; nothing is clamped.
pub fn compute_pay(
    base_salary: f64,
    allowances: f64,
    deductions: f64,
) -> Result<(f64, f64), PayrollError> {
    let gross_pay = round2(base_salary + allowances);
    let net_pay = round2(gross_pay - deductions);

    if net_pay < 0.0 {
        return Err(PayrollError::NegativeNetPay(net_pay));
    }

    Ok((gross_pay, net_pay))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::PayrollStatus::*;
    use super::*;

    const ALL: [PayrollStatus; 5] = [Generated, PendingSignature, Rejected, Signed, Completed];

    #[test]
    fn only_listed_transitions_are_legal() {
        let legal = [
            (Generated, PendingSignature),
            (PendingSignature, Signed),
            (PendingSignature, Rejected),
            (Signed, Completed),
            (Rejected, PendingSignature),
            (Rejected, Generated),
            (Completed, Completed),
        ];

        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn generated_cannot_jump_to_completed() {
        let err = Generated.check_transition(Completed).unwrap_err();
        assert_eq!(
            err,
            PayrollError::InvalidTransition { from: Generated, to: Completed }
        );
    }

    #[test]
    fn completed_reconfirmation_is_a_no_op() {
        assert!(Completed.check_transition(Completed).is_ok());
        assert!(!Completed.can_transition(Generated));
        assert!(!Completed.can_transition(PendingSignature));
    }

    #[test]
    fn signed_record_cannot_be_rejected() {
        assert!(!Signed.can_transition(Rejected));
        assert!(!Completed.can_transition(Rejected));
    }

    #[test]
    fn pay_is_recomputed_from_parts() {
        let (gross, net) = compute_pay(5000.0, 200.0, 300.0).unwrap();
        assert_eq!(gross, 5200.0);
        assert_eq!(net, 4900.0);
    }

    #[test]
    fn negative_net_pay_rejects_the_update() {
        let err = compute_pay(5000.0, 200.0, 5300.0).unwrap_err();
        assert_eq!(err, PayrollError::NegativeNetPay(-100.0));
    }

    #[test]
    fn zero_net_pay_is_allowed() {
        let (_, net) = compute_pay(1000.0, 0.0, 1000.0).unwrap();
        assert_eq!(net, 0.0);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in ALL {
            let parsed: PayrollStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(PendingSignature.to_string(), "pending_signature");
    }
}
