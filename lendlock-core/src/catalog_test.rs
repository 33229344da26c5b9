#[cfg(test)]
mod tests {
    use crate::error::{CoordinatorError, StoreError};
    use crate::store::{Consistency, Key, ReplicatedStore, Value, row};
    use crate::test_support::fixture;
    use crate::types::ItemId;

    #[test]
    fn inserted_items_are_found_by_title() {
        let fx = fixture(2);
        let first = fx.catalog.insert_item("Dune", "Frank Herbert").unwrap();
        let second = fx.catalog.insert_item("Dune", "Frank Herbert").unwrap();
        fx.catalog.insert_item("Emma", "Jane Austen").unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.available);

        let found = fx.catalog.find_items_by_title("Dune").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&first));
        assert!(found.contains(&second));
        assert!(fx.catalog.find_items_by_title("Ulysses").unwrap().is_empty());
        assert_eq!(fx.catalog.list_items().unwrap().len(), 3);
    }

    #[test]
    fn get_item_by_id_and_by_key() {
        let fx = fixture(2);
        let item = fx.catalog.insert_item("Emma", "Jane Austen").unwrap();

        assert_eq!(fx.catalog.get_item(&item.id).unwrap(), Some(item.clone()));
        assert_eq!(fx.catalog.get_item_by_key(&item.key()).unwrap(), Some(item));
        assert_eq!(fx.catalog.get_item(&ItemId::new("nope")).unwrap(), None);
    }

    #[test]
    fn holder_registration_is_first_writer_wins() {
        let fx = fixture(2);
        assert!(fx.catalog.register_holder("alice").unwrap());
        assert!(!fx.catalog.register_holder("alice").unwrap());

        let alice = fx.catalog.get_holder("alice").unwrap().unwrap();
        assert_eq!(alice.active_count, 0);
        assert!(fx.catalog.get_holder("bob").unwrap().is_none());
        assert_eq!(fx.catalog.list_holders().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_registration_has_one_winner() {
        let fx = fixture(2);
        let winners = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| fx.catalog.register_holder("carol").unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|created| *created)
                .count()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn reads_fail_without_quorum() {
        let fx = fixture(2);
        fx.store.set_live_replicas(1);
        let err = fx.catalog.find_items_by_title("Dune").unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Store(StoreError::Unavailable { .. })
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn corrupt_rows_are_reported() {
        let fx = fixture(2);
        fx.store
            .put(
                &Key::holder("mallory"),
                row([("active_count", Value::from("lots"))]),
                Consistency::Quorum,
            )
            .unwrap();
        let err = fx.catalog.get_holder("mallory").unwrap_err();
        assert!(matches!(err, CoordinatorError::CorruptRow { .. }));
    }

    #[test]
    fn reservations_are_listed_per_holder() {
        let fx = fixture(3);
        fx.holder("alice");
        fx.holder("bob");
        let dune = fx.book("Dune");
        let emma = fx.book("Emma");
        fx.coordinator.reserve("alice", &dune.id, "Dune", 10).unwrap();
        fx.coordinator.reserve("bob", &emma.id, "Emma", 20).unwrap();

        let alice = fx.catalog.reservations_of("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].item_id, dune.id);
        assert_eq!(alice[0].due_at, 10);
        assert_eq!(fx.catalog.list_reservations().unwrap().len(), 2);
        assert!(fx.catalog.get_reservation("bob", &dune.id).unwrap().is_none());
    }
}
