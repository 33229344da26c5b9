//! Fault-injecting store wrapper.
//!
//! Wraps any backend and fails selected calls the way a flaky cluster would:
//! refusing up front, or timing out before or after the write reached the
//! replicas. The last case is what makes an outcome indeterminate.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Scan,
    Put,
    ConditionalPut,
    Delete,
    ConditionalDelete,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Scan => "scan",
            Operation::Put => "put",
            Operation::ConditionalPut => "conditional put",
            Operation::Delete => "delete",
            Operation::ConditionalDelete => "conditional delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Rejected before reaching any replica.
    Unavailable,
    /// Timed out; the write was never applied.
    TimeoutBeforeApply,
    /// Timed out after the write was applied.
    TimeoutAfterApply,
    /// A hard backend error; the write was not applied.
    Backend,
}

#[derive(Debug, Clone)]
struct FaultRule {
    operation: Operation,
    table: Option<Table>,
    /// Matching calls to let through before firing
    skip: usize,
    fault: Fault,
}

pub struct FaultyStore<S> {
    inner: S,
    rules: Mutex<Vec<FaultRule>>,
}

impl<S: ReplicatedStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `operation` on `table` (any table when `None`).
    pub fn inject(&self, operation: Operation, table: Option<Table>, fault: Fault) {
        self.inject_after(operation, table, 0, fault);
    }

    /// Let `skip` matching calls through, then fail the next one.
    pub fn inject_after(&self, operation: Operation, table: Option<Table>, skip: usize, fault: Fault) {
        self.rules().push(FaultRule {
            operation,
            table,
            skip,
            fault,
        });
    }

    pub fn pending_faults(&self) -> usize {
        self.rules().len()
    }

    pub fn clear(&self) {
        self.rules().clear();
    }

    fn rules(&self) -> MutexGuard<'_, Vec<FaultRule>> {
        self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_fault(&self, operation: Operation, table: Table) -> Option<Fault> {
        let mut rules = self.rules();
        let mut fired = None;
        for (index, rule) in rules.iter_mut().enumerate() {
            if rule.operation != operation || rule.table.is_some_and(|t| t != table) {
                continue;
            }
            if rule.skip > 0 {
                rule.skip -= 1;
                continue;
            }
            fired = Some(index);
            break;
        }
        fired.map(|index| rules.remove(index).fault)
    }

    /// Runs `call` under whatever fault is armed for this operation.
    fn intercept<T>(
        &self,
        operation: Operation,
        key: &Key,
        consistency: Consistency,
        call: impl FnOnce() -> StoreResult<T>,
    ) -> StoreResult<T> {
        let Some(fault) = self.take_fault(operation, key.table) else {
            return call();
        };
        debug!(%key, operation = operation.name(), ?fault, "injecting store fault");
        let timeout = || StoreError::Timeout {
            operation: operation.name(),
            key: key.to_string(),
        };
        match fault {
            Fault::Unavailable => Err(StoreError::Unavailable {
                consistency,
                required: 1,
                alive: 0,
            }),
            Fault::TimeoutBeforeApply => Err(timeout()),
            Fault::Backend => Err(StoreError::Backend(format!(
                "injected failure on {} of {}",
                operation.name(),
                key
            ))),
            Fault::TimeoutAfterApply => {
                let _ = call()?;
                Err(timeout())
            }
        }
    }
}

impl<S: ReplicatedStore> ReplicatedStore for FaultyStore<S> {
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>> {
        self.intercept(Operation::Get, key, consistency, || {
            self.inner.get(key, consistency)
        })
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        let probe = Key::new(table, partition.unwrap_or("*"), "");
        self.intercept(Operation::Scan, &probe, consistency, || {
            self.inner.scan(table, partition, consistency)
        })
    }

    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()> {
        self.intercept(Operation::Put, key, consistency, || {
            self.inner.put(key, row, consistency)
        })
    }

    fn conditional_put(
        &self,
        key: &Key,
        row: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.intercept(Operation::ConditionalPut, key, consistency, || {
            self.inner.conditional_put(key, row, condition, consistency)
        })
    }

    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()> {
        self.intercept(Operation::Delete, key, consistency, || {
            self.inner.delete(key, consistency)
        })
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.intercept(Operation::ConditionalDelete, key, consistency, || {
            self.inner.conditional_delete(key, condition, consistency)
        })
    }
}
