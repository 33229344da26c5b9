#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use crate::error::CoordinatorError;
    use crate::quota::{Charge, QuotaLedger};
    use crate::store::{Consistency, ReplicatedStore};
    use crate::store_in_memory::InMemoryStore;
    use crate::test_support::{Fixture, MeddlingStore, fixture};
    use crate::config::ReservationConfig;

    fn ledger(store: Arc<dyn ReplicatedStore>) -> QuotaLedger {
        QuotaLedger::new(store, Consistency::Serial, 16)
    }

    #[test]
    fn increments_up_to_quota() {
        let fx = fixture(2);
        fx.holder("alice");
        let quota = ledger(fx.store.clone());

        assert_eq!(quota.try_increment("alice", 2).unwrap(), Charge::Charged);
        assert_eq!(quota.try_increment("alice", 2).unwrap(), Charge::Charged);
        assert_eq!(quota.try_increment("alice", 2).unwrap(), Charge::AtQuota);
        assert_eq!(quota.current("alice").unwrap(), Some(2));
    }

    #[test]
    fn decrement_returns_a_unit() {
        let fx = fixture(2);
        fx.holder("alice");
        let quota = ledger(fx.store.clone());

        quota.try_increment("alice", 2).unwrap();
        quota.decrement("alice").unwrap();
        assert_eq!(fx.count("alice"), 0);
    }

    #[test]
    fn decrement_at_zero_is_an_invariant_violation() {
        let fx = fixture(2);
        fx.holder("alice");
        let quota = ledger(fx.store.clone());

        let err = quota.decrement("alice").unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(fx.count("alice"), 0);
    }

    #[test]
    fn unknown_holder_is_not_charged() {
        let fx = fixture(2);
        let quota = ledger(fx.store.clone());
        assert_eq!(quota.current("nobody").unwrap(), None);
        assert_eq!(quota.try_increment("nobody", 2).unwrap(), Charge::UnknownHolder);
        assert_eq!(quota.current("nobody").unwrap(), None);
    }

    #[test]
    fn releasing_for_an_unknown_holder_is_an_invariant_violation() {
        let fx = fixture(2);
        let quota = ledger(fx.store.clone());
        assert!(quota.decrement("nobody").unwrap_err().is_invariant_violation());
    }

    #[test]
    fn concurrent_increments_stop_exactly_at_quota() {
        let fx = fixture(5);
        fx.holder("bob");
        let quota = ledger(fx.store.clone());
        let barrier = Barrier::new(20);

        let charged = std::thread::scope(|s| {
            let handles: Vec<_> = (0..20)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        quota.try_increment("bob", 5).unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|charge| *charge == Charge::Charged)
                .count()
        });
        assert_eq!(charged, 5);
        assert_eq!(fx.count("bob"), 5);
    }

    #[test]
    fn endless_interference_gives_up_as_contended() {
        let fx = Fixture::over(
            MeddlingStore {
                inner: InMemoryStore::new(),
            },
            ReservationConfig::default(),
        );
        fx.holder("alice");
        let quota = QuotaLedger::new(fx.store.clone(), Consistency::Serial, 4);

        let err = quota.try_increment("alice", 3).unwrap_err();
        assert!(matches!(err, CoordinatorError::Contended { attempts: 4, .. }));
        assert_eq!(fx.count("alice"), 0);
    }
}
