//! Validation utilities

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::traits::*;
use crate::types::*;

/// Validate that an amount is not negative
pub fn validate_non_negative_amount(
    side: Side,
    key: &str,
    amount: &BigDecimal,
) -> Result<(), InputError> {
    if *amount < BigDecimal::from(0) {
        Err(InputError::NegativeAmount {
            side,
            key: key.to_string(),
            amount: amount.clone(),
        })
    } else {
        Ok(())
    }
}

/// Validate that an entry key is usable as an identifier
pub fn validate_entry_key(side: Side, index: usize, key: &str) -> Result<(), InputError> {
    if key.trim().is_empty() {
        return Err(InputError::EmptyKey { side, index });
    }

    Ok(())
}

/// Validate one side of the reconciliation input.
///
/// Keys must be non-empty and unique within the side, amounts must not be
/// negative. The first problem found is reported.
pub fn validate_entries<E: ReconcilableEntry>(entries: &[E]) -> Result<(), InputError> {
    let mut seen = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        validate_entry_key(E::SIDE, index, entry.key())?;
        validate_non_negative_amount(E::SIDE, entry.key(), entry.amount())?;

        if !seen.insert(entry.key()) {
            return Err(InputError::DuplicateKey {
                side: E::SIDE,
                key: entry.key().to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_zero_amount_is_accepted() {
        assert!(validate_non_negative_amount(Side::Bank, "B1", &BigDecimal::from(0)).is_ok());
        assert!(validate_non_negative_amount(Side::Bank, "B1", &BigDecimal::from(-1)).is_err());
    }

    #[test]
    fn test_blank_keys_are_rejected() {
        let entries = vec![
            BankEntry::new("B1".to_string(), BigDecimal::from(10), date()),
            BankEntry::new("  ".to_string(), BigDecimal::from(10), date()),
        ];

        assert_eq!(
            validate_entries(&entries),
            Err(InputError::EmptyKey {
                side: Side::Bank,
                index: 1
            })
        );
    }

    #[test]
    fn test_duplicate_keys_are_rejected_per_side() {
        let ledger = vec![
            LedgerEntry::new("X".to_string(), BigDecimal::from(1), date()),
            LedgerEntry::new("X".to_string(), BigDecimal::from(2), date()),
        ];
        assert_eq!(
            validate_entries(&ledger),
            Err(InputError::DuplicateKey {
                side: Side::Ledger,
                key: "X".to_string()
            })
        );

        // The same key on both sides is fine
        let bank = vec![BankEntry::new("X".to_string(), BigDecimal::from(1), date())];
        assert!(validate_entries(&ledger[..1]).is_ok());
        assert!(validate_entries(&bank).is_ok());
    }
}
