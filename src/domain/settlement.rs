use serde::{Deserialize, Serialize};

use super::{Balances, Cents, EngineError, FriendId, SETTLED_TOLERANCE, is_settled, total_balance};

/// A single payment instruction: `from` pays `to` the given amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Debtor
    pub from: FriendId,
    /// Creditor
    pub to: FriendId,
    pub amount_cents: Cents,
}

/// Largest total imbalance accepted for a map of `entries` balances.
pub fn conservation_tolerance(entries: usize) -> Cents {
    let entries = i64::try_from(entries.max(1)).unwrap_or(i64::MAX);
    SETTLED_TOLERANCE.saturating_mul(entries)
}

/// Verify that the balances net out to zero within tolerance.
pub fn check_conservation(balances: &Balances) -> Result<(), EngineError> {
    let total = total_balance(balances);
    let tolerance = conservation_tolerance(balances.len());
    if total.unsigned_abs() >= u128::from(tolerance.unsigned_abs()) {
        let total = Cents::try_from(total)
            .unwrap_or(if total < 0 { Cents::MIN } else { Cents::MAX });
        return Err(EngineError::ConservationViolation { total, tolerance });
    }
    Ok(())
}

/// Plan the payments that settle every balance, after checking that the
/// balances sum to zero.
pub fn plan_settlements(balances: &Balances) -> Result<Vec<Settlement>, EngineError> {
    check_conservation(balances)?;
    Ok(plan_settlements_unchecked(balances))
}

/// Greedy two-pointer netting over the balances.
///
/// Balances are sorted ascending (largest debtor first, largest creditor last)
/// and the outermost debtor pays the outermost creditor the smaller of the two
/// magnitudes. Each payment settles at least one side, so `n` non-zero
/// balances need at most `n - 1` payments. The sort is stable and the map is
/// ordered by id, which keeps the plan reproducible.
///
/// Does not check conservation: with a map that doesn't sum to zero the
/// residual stays on whichever side is left over.
pub fn plan_settlements_unchecked(balances: &Balances) -> Vec<Settlement> {
    let mut ledger: Vec<(FriendId, Cents)> = balances.iter().map(|(id, b)| (*id, *b)).collect();
    ledger.sort_by_key(|(_, balance)| *balance);

    let mut settlements = Vec::new();
    if ledger.len() < 2 {
        return settlements;
    }

    let mut i = 0;
    let mut j = ledger.len() - 1;

    while i < j {
        let (debtor, debt) = ledger[i];
        let (creditor, credit) = ledger[j];

        if is_settled(debt) {
            i += 1;
            continue;
        }
        if is_settled(credit) {
            j -= 1;
            continue;
        }
        // Both ends on the same side of zero: nothing left to net.
        if debt > 0 || credit < 0 {
            break;
        }

        // credit > 0, so the smaller magnitude always fits back into Cents
        let amount = Cents::try_from(debt.unsigned_abs().min(credit.unsigned_abs()))
            .unwrap_or(credit);
        settlements.push(Settlement {
            from: debtor,
            to: creditor,
            amount_cents: amount,
        });
        ledger[i].1 += amount;
        ledger[j].1 -= amount;

        if is_settled(ledger[i].1) {
            i += 1;
        }
        if is_settled(ledger[j].1) {
            j -= 1;
        }
    }

    tracing::debug!(
        balances = ledger.len(),
        settlements = settlements.len(),
        "planned settlements"
    );

    settlements
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn balances_of(entries: &[(FriendId, Cents)]) -> Balances {
        entries.iter().copied().collect()
    }

    fn apply(balances: &Balances, settlements: &[Settlement]) -> Balances {
        let mut result = balances.clone();
        for s in settlements {
            *result.get_mut(&s.from).unwrap() += s.amount_cents;
            *result.get_mut(&s.to).unwrap() -= s.amount_cents;
        }
        result
    }

    #[test]
    fn test_single_creditor_two_debtors() {
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let balances = balances_of(&[(alice, 2000), (bob, -1000), (carol, -1000)]);

        let plan = plan_settlements(&balances).unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|s| s.to == alice && s.amount_cents == 1000));
        let payers: Vec<FriendId> = plan.iter().map(|s| s.from).collect();
        assert!(payers.contains(&bob));
        assert!(payers.contains(&carol));
    }

    #[test]
    fn test_single_debtor_two_creditors() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let balances = balances_of(&[(a, -500), (b, 200), (c, 300)]);

        let plan = plan_settlements(&balances).unwrap();

        assert_eq!(
            plan,
            vec![
                Settlement { from: a, to: c, amount_cents: 300 },
                Settlement { from: a, to: b, amount_cents: 200 },
            ]
        );
    }

    #[test]
    fn test_all_settled_yields_empty_plan() {
        let balances = balances_of(&[(Uuid::new_v4(), 0), (Uuid::new_v4(), 0), (Uuid::new_v4(), 0)]);
        assert!(plan_settlements(&balances).unwrap().is_empty());
        assert!(plan_settlements(&Balances::new()).unwrap().is_empty());
    }

    #[test]
    fn test_plan_zeroes_every_balance() {
        let ids: Vec<FriendId> = (0..5).map(|_| Uuid::new_v4()).collect();
        let balances = balances_of(&[
            (ids[0], -4550),
            (ids[1], 1275),
            (ids[2], -25),
            (ids[3], 3300),
            (ids[4], 0),
        ]);

        let plan = plan_settlements(&balances).unwrap();
        let after = apply(&balances, &plan);

        assert!(after.values().all(|b| is_settled(*b)));
        assert!(plan.len() <= 3, "4 non-zero balances need at most 3 payments");
        assert!(plan.iter().all(|s| s.from != s.to && s.amount_cents > 0));
    }

    #[test]
    fn test_plan_is_reproducible_with_ties() {
        let ids: Vec<FriendId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let balances = balances_of(&[(ids[0], -100), (ids[1], -100), (ids[2], 100), (ids[3], 100)]);

        let first = plan_settlements(&balances).unwrap();
        let second = plan_settlements(&balances.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_conservation_violation_is_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let balances = balances_of(&[(a, -500), (b, 700)]);

        assert_eq!(
            plan_settlements(&balances),
            Err(EngineError::ConservationViolation {
                total: 200,
                tolerance: 2,
            })
        );
    }

    #[test]
    fn test_unchecked_plan_terminates_with_residual() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let balances = balances_of(&[(a, -500), (b, 700), (c, 300)]);

        let plan = plan_settlements_unchecked(&balances);
        let paid: Cents = plan.iter().map(|s| s.amount_cents).sum();

        assert_eq!(paid, 500);
        assert!(plan.iter().all(|s| s.from == a));
    }

    #[test]
    fn test_conservation_tolerance_scales_with_entries() {
        assert_eq!(conservation_tolerance(0), 1);
        assert_eq!(conservation_tolerance(4), 4);
    }

    #[test]
    fn test_large_balances_do_not_overflow() {
        let ids: Vec<FriendId> = (1..=4u128).map(Uuid::from_u128).collect();
        let big = 6_000_000_000_000_000_000;
        let balances = balances_of(&[(ids[0], big), (ids[1], big), (ids[2], -big), (ids[3], -big)]);

        let plan = plan_settlements(&balances).unwrap();

        assert_eq!(
            plan,
            vec![
                Settlement { from: ids[2], to: ids[1], amount_cents: big },
                Settlement { from: ids[3], to: ids[0], amount_cents: big },
            ]
        );
    }

    #[test]
    fn test_large_imbalance_is_reported_saturated() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let balances = balances_of(&[(a, Cents::MAX), (b, Cents::MAX)]);

        assert_eq!(
            plan_settlements(&balances),
            Err(EngineError::ConservationViolation {
                total: Cents::MAX,
                tolerance: 2,
            })
        );
    }

    #[test]
    fn test_unchecked_plan_handles_minimum_balance() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let balances = balances_of(&[(a, Cents::MIN), (b, Cents::MAX)]);

        let plan = plan_settlements_unchecked(&balances);

        assert_eq!(plan, vec![Settlement { from: a, to: b, amount_cents: Cents::MAX }]);
    }
}
