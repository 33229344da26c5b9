//! Offline invariant check over the whole keyspace.
//!
//! Compares item availability, holder counters and reservation rows. The
//! scans are not a snapshot, so a report taken while reservations are in
//! flight can show the short locked-but-uncharged window as a violation;
//! audit a quiescent store for a definitive answer.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use tracing::{info, warn};

use crate::catalog::CatalogRepository;
use crate::error::Result;
use crate::types::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Violation {
    /// `available = false` with no reservation pointing at the item
    LockedWithoutReservation { item_id: ItemId, title: String },
    /// `available = true` although a reservation holds the item
    AvailableButReserved { item_id: ItemId, holder: String },
    /// More than one reservation holds the same item
    DoubleAllocation { item_id: ItemId, holders: Vec<String> },
    /// Counter disagrees with the reservation rows
    CountMismatch {
        holder: String,
        active_count: u32,
        reservations: u32,
    },
    /// Counter above the configured quota
    OverQuota {
        holder: String,
        active_count: u32,
        max_quota: u32,
    },
    /// A reservation naming an item or holder that does not exist
    Dangling { holder: String, item_id: ItemId },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub items: usize,
    pub holders: usize,
    pub reservations: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn audit(catalog: &CatalogRepository, max_quota: u32) -> Result<AuditReport> {
    let items = catalog.list_items()?;
    let holders = catalog.list_holders()?;
    let reservations = catalog.list_reservations()?;

    let mut by_item: BTreeMap<&ItemId, Vec<&str>> = BTreeMap::new();
    let mut by_holder: BTreeMap<&str, u32> = BTreeMap::new();
    for reservation in &reservations {
        by_item
            .entry(&reservation.item_id)
            .or_default()
            .push(reservation.holder.as_str());
        *by_holder.entry(reservation.holder.as_str()).or_default() += 1;
    }

    let mut violations = Vec::new();
    let known_items: HashSet<&ItemId> = items.iter().map(|item| &item.id).collect();
    let known_holders: HashSet<&str> = holders.iter().map(|h| h.name.as_str()).collect();

    for item in &items {
        match by_item.get(&item.id).map(Vec::as_slice) {
            None | Some([]) if !item.available => {
                violations.push(Violation::LockedWithoutReservation {
                    item_id: item.id.clone(),
                    title: item.title.clone(),
                });
            }
            Some([holder]) if item.available => {
                violations.push(Violation::AvailableButReserved {
                    item_id: item.id.clone(),
                    holder: holder.to_string(),
                });
            }
            Some(many) if many.len() > 1 => {
                violations.push(Violation::DoubleAllocation {
                    item_id: item.id.clone(),
                    holders: many.iter().map(|h| h.to_string()).collect(),
                });
            }
            _ => {}
        }
    }

    for holder in &holders {
        let reserved = by_holder.get(holder.name.as_str()).copied().unwrap_or(0);
        if holder.active_count != reserved {
            violations.push(Violation::CountMismatch {
                holder: holder.name.clone(),
                active_count: holder.active_count,
                reservations: reserved,
            });
        }
        if holder.active_count > max_quota {
            violations.push(Violation::OverQuota {
                holder: holder.name.clone(),
                active_count: holder.active_count,
                max_quota,
            });
        }
    }

    for reservation in &reservations {
        if !known_items.contains(&reservation.item_id)
            || !known_holders.contains(reservation.holder.as_str())
        {
            violations.push(Violation::Dangling {
                holder: reservation.holder.clone(),
                item_id: reservation.item_id.clone(),
            });
        }
    }

    let report = AuditReport {
        items: items.len(),
        holders: holders.len(),
        reservations: reservations.len(),
        violations,
    };
    if report.is_clean() {
        info!(
            items = report.items,
            holders = report.holders,
            reservations = report.reservations,
            "audit clean"
        );
    } else {
        warn!(violations = report.violations.len(), "audit found violations");
    }
    Ok(report)
}
