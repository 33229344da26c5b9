//! Load generator: many threads reserving and releasing against one shared
//! coordinator, followed by a full audit.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use lendlock_core::audit::AuditReport;
use lendlock_core::client::LendingClient;
use lendlock_core::types::{Item, Outcome};

#[derive(Debug, Clone)]
pub struct StressPlan {
    pub clients: usize,
    pub items: usize,
    pub ops: usize,
    pub seed: u64,
}

#[derive(Debug, Serialize)]
pub struct StressReport {
    pub operations: usize,
    pub elapsed_ms: u128,
    pub tallies: BTreeMap<String, u64>,
    pub audit: AuditReport,
}

pub fn run(client: &LendingClient, plan: &StressPlan) -> lendlock_core::Result<StressReport> {
    let holders: Vec<String> = (0..plan.clients).map(|i| format!("client-{}", i)).collect();
    for name in &holders {
        client.register_holder(name)?;
    }
    let items = (0..plan.items)
        .map(|i| client.add_item(&format!("Title {}", i % 5), "Stress"))
        .collect::<lendlock_core::Result<Vec<Item>>>()?;
    tracing::info!(
        clients = plan.clients,
        items = plan.items,
        ops = plan.ops,
        "stress run starting"
    );

    let started = Instant::now();
    let per_thread: Vec<BTreeMap<String, u64>> = std::thread::scope(|s| {
        let handles: Vec<_> = holders
            .iter()
            .enumerate()
            .map(|(n, holder)| {
                let items = &items;
                let seed = plan.seed.wrapping_add(n as u64);
                s.spawn(move || drive(client, holder, items, plan.ops, seed))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| settle(h.join(), plan.ops))
            .collect()
    });
    let elapsed_ms = started.elapsed().as_millis();

    let mut tallies = BTreeMap::new();
    for tally in per_thread {
        for (label, count) in tally {
            *tallies.entry(label).or_insert(0) += count;
        }
    }
    let audit = client.audit()?;
    Ok(StressReport {
        operations: plan.clients * plan.ops,
        elapsed_ms,
        tallies,
        audit,
    })
}

/// A worker that panicked still owes a tally: its operations count as errors.
fn settle(
    joined: std::thread::Result<BTreeMap<String, u64>>,
    ops: usize,
) -> BTreeMap<String, u64> {
    joined.unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(error = %message, "stress worker panicked");
        BTreeMap::from([("worker panicked error".to_string(), ops as u64)])
    })
}

fn drive(
    client: &LendingClient,
    holder: &str,
    items: &[Item],
    ops: usize,
    seed: u64,
) -> BTreeMap<String, u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = BTreeMap::new();
    if items.is_empty() {
        return tally;
    }
    for _ in 0..ops {
        let item = &items[rng.gen_range(0..items.len())];
        let (verb, result) = if rng.gen_bool(0.6) {
            ("reserve", client.reserve(holder, &item.id, &item.title, None))
        } else {
            ("release", client.release(holder, &item.id, &item.title))
        };
        *tally.entry(label(verb, &result)).or_insert(0) += 1;
    }
    tally
}

fn label(verb: &str, result: &lendlock_core::Result<Outcome>) -> String {
    match result {
        Ok(Outcome::Committed) => format!("{} committed", verb),
        Ok(Outcome::Rejected { reason }) => format!("{} rejected {:?}", verb, reason),
        Ok(Outcome::Indeterminate { stage, .. }) => format!("{} indeterminate at {}", verb, stage),
        Err(e) if e.is_invariant_violation() => format!("{} invariant violation", verb),
        Err(_) => format!("{} error", verb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendlock_core::config::ReservationConfig;

    #[test]
    fn stress_run_leaves_a_clean_store() {
        let client =
            LendingClient::in_memory(ReservationConfig::default().with_max_quota(2)).unwrap();
        let plan = StressPlan {
            clients: 6,
            items: 4,
            ops: 50,
            seed: 7,
        };

        let report = run(&client, &plan).unwrap();

        assert_eq!(report.operations, 300);
        assert_eq!(report.tallies.values().sum::<u64>(), 300);
        assert!(report.tallies.keys().all(|k| !k.contains("error") && !k.contains("invariant")));
        assert!(report.audit.is_clean(), "violations: {:?}", report.audit.violations);
        assert_eq!(report.audit.holders, 6);
    }

    #[test]
    fn panicked_worker_is_counted_as_errors() {
        let panicked = std::thread::spawn(|| -> BTreeMap<String, u64> { panic!("boom") }).join();

        let tally = settle(panicked, 25);

        assert_eq!(tally.get("worker panicked error"), Some(&25));
        assert!(tally.keys().any(|k| k.contains("error")));
    }

    #[test]
    fn finished_worker_keeps_its_tally() {
        let tally = BTreeMap::from([("reserve committed".to_string(), 3)]);

        assert_eq!(settle(Ok(tally.clone()), 3), tally);
    }
}
