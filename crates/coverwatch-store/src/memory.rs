//! In-memory compliance store, for tests and one-shot CLI runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use coverwatch_core::{
    Assignment, AssignmentKey, ComplianceStatus, Exception, ExceptionId, VerdictId,
    VerdictRecord, normalize_identifier,
};
use tracing::debug;

use crate::{ChangeSet, CommitReceipt, ComplianceStore, ExceptionWrite, StoreError};

#[derive(Default)]
struct Inner {
    assignments: HashMap<AssignmentKey, Assignment>,
    verdicts: Vec<VerdictRecord>,
    exceptions: BTreeMap<ExceptionId, Exception>,
}

/// Compliance store held in process memory.
///
/// One `RwLock` guards all state; a commit holds the write lock while it
/// checks preconditions and applies, which makes it atomic.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_verdict: AtomicU64,
    next_exception: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_verdict: AtomicU64::new(1),
            next_exception: AtomicU64::new(1),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ComplianceStore for MemoryStore {
    fn register_assignment(
        &self,
        key: &AssignmentKey,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError> {
        let mut inner = self.write()?;
        let assignment = inner
            .assignments
            .entry(key.clone())
            .or_insert_with(|| Assignment {
                key: key.clone(),
                status: ComplianceStatus::Pending,
                version: 0,
                latest_verdict: None,
                updated_at: at,
            });
        Ok(assignment.clone())
    }

    fn assignment(&self, key: &AssignmentKey) -> Result<Assignment, StoreError> {
        self.read()?
            .assignments
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("assignment {key}")))
    }

    fn exception(&self, id: ExceptionId) -> Result<Exception, StoreError> {
        self.read()?
            .exceptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("exception {id}")))
    }

    fn open_exception(&self, key: &AssignmentKey) -> Result<Option<Exception>, StoreError> {
        Ok(self
            .read()?
            .exceptions
            .values()
            .find(|e| &e.assignment == key && e.status.is_open())
            .cloned())
    }

    fn exceptions_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<Exception>, StoreError> {
        Ok(self
            .read()?
            .exceptions
            .values()
            .filter(|e| &e.assignment == key)
            .cloned()
            .collect())
    }

    fn due_exceptions(&self, as_of: DateTime<Utc>) -> Result<Vec<Exception>, StoreError> {
        Ok(self
            .read()?
            .exceptions
            .values()
            .filter(|e| e.is_due(as_of))
            .cloned()
            .collect())
    }

    fn verdict_for_document(&self, document_id: &str) -> Result<Option<VerdictRecord>, StoreError> {
        Ok(self
            .read()?
            .verdicts
            .iter()
            .rev()
            .find(|v| v.document_id() == document_id)
            .cloned())
    }

    fn verdicts_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<VerdictRecord>, StoreError> {
        Ok(self
            .read()?
            .verdicts
            .iter()
            .filter(|v| &v.assignment == key)
            .cloned()
            .collect())
    }

    fn verdicts_for_policy(&self, policy_number: &str) -> Result<Vec<VerdictRecord>, StoreError> {
        let wanted = normalize_identifier(policy_number);
        Ok(self
            .read()?
            .verdicts
            .iter()
            .filter(|v| {
                v.policy
                    .policy_number
                    .as_deref()
                    .is_some_and(|p| normalize_identifier(p) == wanted)
            })
            .cloned()
            .collect())
    }

    fn allocate_verdict_id(&self) -> Result<VerdictId, StoreError> {
        Ok(VerdictId(self.next_verdict.fetch_add(1, Ordering::Relaxed)))
    }

    fn allocate_exception_id(&self) -> Result<ExceptionId, StoreError> {
        Ok(ExceptionId(self.next_exception.fetch_add(1, Ordering::Relaxed)))
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        let mut inner = self.write()?;

        // ── Preconditions ──

        if let Some(write) = &changes.assignment {
            let current = inner
                .assignments
                .get(&write.key)
                .ok_or_else(|| StoreError::NotFound(format!("assignment {}", write.key)))?;
            if current.version != write.expected_version {
                return Err(StoreError::Conflict(format!(
                    "assignment {} is at version {}, expected {}",
                    write.key, current.version, write.expected_version
                )));
            }
        }

        if let Some(record) = &changes.verdict
            && inner.verdicts.iter().any(|v| v.id == record.id)
        {
            return Err(StoreError::Conflict(format!("verdict {} already recorded", record.id)));
        }

        for write in &changes.exceptions {
            match write {
                ExceptionWrite::Insert(exc) => {
                    if inner.exceptions.contains_key(&exc.id) {
                        return Err(StoreError::Conflict(format!("exception {} already exists", exc.id)));
                    }
                    let has_open = inner
                        .exceptions
                        .values()
                        .any(|e| e.assignment == exc.assignment && e.status.is_open());
                    if exc.status.is_open() && has_open {
                        return Err(StoreError::Conflict(format!(
                            "assignment {} already has an open exception",
                            exc.assignment
                        )));
                    }
                }
                ExceptionWrite::Transition { expected, next } => {
                    let current = inner
                        .exceptions
                        .get(&next.id)
                        .ok_or_else(|| StoreError::NotFound(format!("exception {}", next.id)))?;
                    if current.status != *expected {
                        return Err(StoreError::Conflict(format!(
                            "exception {} is {}, expected {}",
                            next.id, current.status, expected
                        )));
                    }
                }
            }
        }

        // ── Apply ──

        let mut receipt = CommitReceipt::default();

        if let Some(write) = changes.assignment
            && let Some(current) = inner.assignments.get_mut(&write.key)
        {
            current.status = write.status;
            current.version += 1;
            current.updated_at = changes.at;
            if write.latest_verdict.is_some() {
                current.latest_verdict = write.latest_verdict;
            }
            debug!(
                assignment = %write.key,
                status = %current.status,
                version = current.version,
                "assignment updated"
            );
            receipt.assignment = Some(current.clone());
        }

        if let Some(record) = changes.verdict {
            inner.verdicts.push(record);
        }

        for write in changes.exceptions {
            let exc = match write {
                ExceptionWrite::Insert(exc) => exc,
                ExceptionWrite::Transition { next, .. } => next,
            };
            inner.exceptions.insert(exc.id, exc);
        }

        Ok(receipt)
    }
}
