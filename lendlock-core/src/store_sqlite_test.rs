#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use crate::client::LendingClient;
    use crate::config::ReservationConfig;
    use crate::store::{Condition, Consistency, Key, ReplicatedStore, Table, Value, row};
    use crate::store_sqlite::SqliteStore;
    use crate::test_support::{DUE, Fixture};

    const S: Consistency = Consistency::Serial;

    fn temp_db() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lendlock.db").to_string_lossy().into_owned();
        (dir, path)
    }

    #[test]
    fn conditional_writes_match_the_in_memory_backend() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = Key::item("Dune", "i1");
        let flag = |b: bool| row([("available", Value::from(b))]);

        assert!(store.conditional_put(&key, flag(true), &Condition::NotExists, S).unwrap());
        assert!(!store.conditional_put(&key, flag(true), &Condition::NotExists, S).unwrap());

        let guard = Condition::equals("available", true);
        assert!(store.conditional_put(&key, flag(false), &guard, S).unwrap());
        assert!(!store.conditional_put(&key, flag(false), &guard, S).unwrap());

        assert!(!store.conditional_delete(&key, &guard, S).unwrap());
        assert!(store.conditional_delete(&key, &Condition::Exists, S).unwrap());
        assert!(store.get(&key, S).unwrap().is_none());
    }

    #[test]
    fn values_keep_their_types() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = Key::reservation("alice", "i1");
        let stored = row([
            ("item_title", Value::from("Dune")),
            ("due_at", Value::from(DUE)),
            ("flag", Value::from(true)),
        ]);
        store.put(&key, stored.clone(), S).unwrap();

        assert_eq!(store.get(&key, S).unwrap(), Some(stored));
        let scanned = store.scan(Table::Reservations, Some("alice"), S).unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].0, key);
        assert!(store.scan(Table::Reservations, Some("bob"), S).unwrap().is_empty());
    }

    #[test]
    fn reservations_survive_reopen() {
        let (_dir, path) = temp_db();
        let (item_id, title) = {
            let client = LendingClient::with_sqlite(&path, ReservationConfig::default()).unwrap();
            client.register_holder("alice").unwrap();
            let dune = client.add_item("Dune", "Frank Herbert").unwrap();
            let outcome = client.reserve("alice", &dune.id, "Dune", Some(DUE)).unwrap();
            assert!(outcome.is_committed());
            (dune.id, dune.title)
        };

        let client = LendingClient::with_sqlite(&path, ReservationConfig::default()).unwrap();
        let held = client.reservations_of("alice").unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].item_id, item_id);
        assert!(!client.find_items(&title).unwrap()[0].available);

        assert!(client.release("alice", &item_id, &title).unwrap().is_committed());
        assert!(client.audit().unwrap().is_clean());
    }

    #[test]
    fn concurrent_reserve_on_sqlite_has_one_winner() {
        let (_dir, path) = temp_db();
        let fx = Fixture::over(
            SqliteStore::open(&path).unwrap(),
            ReservationConfig::default(),
        );
        fx.holder("alice");
        fx.holder("bob");
        let dune = fx.book("Dune");
        let barrier = Arc::new(Barrier::new(8));

        let committed = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let barrier = barrier.clone();
                    let holder = if i % 2 == 0 { "alice" } else { "bob" };
                    let (fx, dune) = (&fx, &dune);
                    s.spawn(move || {
                        barrier.wait();
                        fx.coordinator.reserve(holder, &dune.id, "Dune", DUE).unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|o| o.is_committed())
                .count()
        });

        assert_eq!(committed, 1);
        assert_eq!(fx.count("alice") + fx.count("bob"), 1);
        assert!(fx.coordinator.audit().unwrap().is_clean());
    }
}
