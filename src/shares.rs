//! Share calculator: pure mapping from declared shares to per-member owed
//! amounts, guarding the downstream distribution against misallocation.
//!
//! Amounts are integer cents, so "within the smallest currency unit" means
//! the shares must sum to the invoice total exactly: a split that is off by
//! even one cent is rejected before any money moves.

use crate::error::{AppError, Result};
use crate::models::InvoiceShare;

/// One member's owed portion of a settled invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwedAmount {
    pub user_id: String,
    pub amount_cents: i64,
}

/// Verify that declared (user, amount) pairs sum to the invoice total.
pub fn verify_shares(total_cents: i64, declared: &[(String, i64)]) -> Result<()> {
    if declared.iter().any(|(_, amount)| *amount < 0) {
        return Err(AppError::BadRequest("Share amounts must be non-negative".into()));
    }

    let actual: i64 = declared.iter().map(|(_, amount)| amount).sum();
    if actual != total_cents {
        return Err(AppError::ShareMismatch {
            expected_cents: total_cents,
            actual_cents: actual,
        });
    }
    Ok(())
}

/// Map an invoice's shares to per-member owed amounts, failing if they do
/// not conserve the total. Deterministic, no I/O.
pub fn owed_amounts(total_cents: i64, shares: &[InvoiceShare]) -> Result<Vec<OwedAmount>> {
    let declared: Vec<(String, i64)> = shares
        .iter()
        .map(|s| (s.user_id.clone(), s.amount_cents))
        .collect();
    verify_shares(total_cents, &declared)?;

    Ok(shares
        .iter()
        .map(|s| OwedAmount {
            user_id: s.user_id.clone(),
            amount_cents: s.amount_cents,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(user: &str, cents: i64) -> (String, i64) {
        (user.to_string(), cents)
    }

    #[test]
    fn test_exact_split_is_valid() {
        // 1000.00 split as 400.00 / 350.00 / 250.00
        let shares = vec![share("a", 40000), share("b", 35000), share("c", 25000)];
        assert!(verify_shares(100000, &shares).is_ok());
    }

    #[test]
    fn test_one_cent_short_is_rejected() {
        // 400.00 / 350.00 / 249.99 against a 1000.00 total
        let shares = vec![share("a", 40000), share("b", 35000), share("c", 24999)];
        let err = verify_shares(100000, &shares).unwrap_err();
        match err {
            AppError::ShareMismatch {
                expected_cents,
                actual_cents,
            } => {
                assert_eq!(expected_cents, 100000);
                assert_eq!(actual_cents, 99999);
            }
            other => panic!("Expected ShareMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_over_allocation_is_rejected() {
        let shares = vec![share("a", 60000), share("b", 60000)];
        assert!(verify_shares(100000, &shares).is_err());
    }

    #[test]
    fn test_empty_shares_for_nonzero_total_is_rejected() {
        assert!(verify_shares(100000, &[]).is_err());
    }

    #[test]
    fn test_negative_share_is_rejected() {
        let shares = vec![share("a", 110000), share("b", -10000)];
        assert!(verify_shares(100000, &shares).is_err());
    }

    #[test]
    fn test_single_full_share() {
        let shares = vec![share("a", 100000)];
        assert!(verify_shares(100000, &shares).is_ok());
    }

    #[test]
    fn test_owed_amounts_preserve_declared_split() {
        let shares = vec![
            InvoiceShare {
                id: "s1".into(),
                invoice_id: "inv1".into(),
                user_id: "a".into(),
                amount_cents: 60000,
                created_at: 0,
            },
            InvoiceShare {
                id: "s2".into(),
                invoice_id: "inv1".into(),
                user_id: "b".into(),
                amount_cents: 40000,
                created_at: 0,
            },
        ];

        let owed = owed_amounts(100000, &shares).unwrap();
        assert_eq!(
            owed,
            vec![
                OwedAmount {
                    user_id: "a".into(),
                    amount_cents: 60000,
                },
                OwedAmount {
                    user_id: "b".into(),
                    amount_cents: 40000,
                },
            ]
        );

        assert!(owed_amounts(90000, &shares).is_err());
    }
}
