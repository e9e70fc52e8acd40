//! DuckDB-backed compliance store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use coverwatch_core::{
    Assignment, AssignmentKey, ComplianceStatus, Exception, ExceptionId, ExceptionStatus,
    VerdictId, VerdictRecord, normalize_identifier,
};
use duckdb::{Connection, params};
use tracing::{debug, info};

use crate::{ChangeSet, CommitReceipt, ComplianceStore, ExceptionWrite, StoreError};

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS verdict_ids START 1;
CREATE SEQUENCE IF NOT EXISTS exception_ids START 1;

CREATE TABLE IF NOT EXISTS assignments (
    project_id       VARCHAR NOT NULL,
    subcontractor_id VARCHAR NOT NULL,
    status           VARCHAR NOT NULL,
    version          BIGINT  NOT NULL,
    latest_verdict   BIGINT,
    updated_at       VARCHAR NOT NULL,
    PRIMARY KEY (project_id, subcontractor_id)
);

CREATE TABLE IF NOT EXISTS verdicts (
    id               BIGINT  PRIMARY KEY,
    document_id      VARCHAR NOT NULL,
    project_id       VARCHAR NOT NULL,
    subcontractor_id VARCHAR NOT NULL,
    policy_number    VARCHAR,
    payload          VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS exceptions (
    id               BIGINT  PRIMARY KEY,
    project_id       VARCHAR NOT NULL,
    subcontractor_id VARCHAR NOT NULL,
    status           VARCHAR NOT NULL,
    payload          VARCHAR NOT NULL
);
";

/// Compliance store on DuckDB.
///
/// Records are kept as JSON payloads next to the columns the store filters
/// on. Each [`ChangeSet`] runs inside one `BEGIN`/`COMMIT`, with the
/// assignment write expressed as `UPDATE ... WHERE version = ?`.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened compliance store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn read_assignment(conn: &Connection, key: &AssignmentKey) -> Result<Assignment, StoreError> {
        let row = conn.query_row(
            "SELECT status, version, latest_verdict, updated_at FROM assignments
             WHERE project_id = ? AND subcontractor_id = ?",
            params![key.project_id, key.subcontractor_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );
        let (status, version, latest, updated_at) = match row {
            Ok(r) => r,
            Err(duckdb::Error::QueryReturnedNoRows) => {
                return Err(StoreError::NotFound(format!("assignment {key}")));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Assignment {
            key: key.clone(),
            status: ComplianceStatus::parse(&status)
                .ok_or_else(|| StoreError::Other(format!("unknown compliance status {status:?}")))?,
            version: version as u64,
            latest_verdict: latest.map(|id| VerdictId(id as u64)),
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn query_exceptions(
        conn: &Connection,
        sql: &str,
        args: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<Exception>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let payloads = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    fn query_verdicts(
        conn: &Connection,
        sql: &str,
        args: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<VerdictRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let payloads = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    fn next_id(&self, sequence: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let id: i64 = conn.query_row(&format!("SELECT nextval('{sequence}')"), [], |row| row.get(0))?;
        Ok(id as u64)
    }

    fn apply(conn: &Connection, changes: &ChangeSet) -> Result<CommitReceipt, StoreError> {
        let mut receipt = CommitReceipt::default();
        let at = changes.at.to_rfc3339();

        if let Some(write) = &changes.assignment {
            let latest = write.latest_verdict.map(|id| id.0 as i64);
            let updated = conn.execute(
                "UPDATE assignments
                 SET status = ?, version = version + 1,
                     latest_verdict = COALESCE(?, latest_verdict), updated_at = ?
                 WHERE project_id = ? AND subcontractor_id = ? AND version = ?",
                params![
                    write.status.as_str(),
                    latest,
                    at,
                    write.key.project_id,
                    write.key.subcontractor_id,
                    write.expected_version as i64
                ],
            )?;
            if updated == 0 {
                // Distinguish a missing row from a lost race.
                let current = Self::read_assignment(conn, &write.key)?;
                return Err(StoreError::Conflict(format!(
                    "assignment {} is at version {}, expected {}",
                    write.key, current.version, write.expected_version
                )));
            }
            receipt.assignment = Some(Self::read_assignment(conn, &write.key)?);
        }

        if let Some(record) = &changes.verdict {
            let policy_number = record.policy.policy_number.as_deref().map(normalize_identifier);
            conn.execute(
                "INSERT INTO verdicts (id, document_id, project_id, subcontractor_id, policy_number, payload)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.id.0 as i64,
                    record.document_id(),
                    record.assignment.project_id,
                    record.assignment.subcontractor_id,
                    policy_number,
                    serde_json::to_string(record)?
                ],
            )?;
        }

        for write in &changes.exceptions {
            match write {
                ExceptionWrite::Insert(exc) => {
                    if exc.status.is_open() {
                        let open: i64 = conn.query_row(
                            "SELECT count(*)::BIGINT FROM exceptions
                             WHERE project_id = ? AND subcontractor_id = ?
                               AND status IN ('pending_approval', 'active')",
                            params![exc.assignment.project_id, exc.assignment.subcontractor_id],
                            |row| row.get(0),
                        )?;
                        if open > 0 {
                            return Err(StoreError::Conflict(format!(
                                "assignment {} already has an open exception",
                                exc.assignment
                            )));
                        }
                    }
                    conn.execute(
                        "INSERT INTO exceptions (id, project_id, subcontractor_id, status, payload)
                         VALUES (?, ?, ?, ?, ?)",
                        params![
                            exc.id.0 as i64,
                            exc.assignment.project_id,
                            exc.assignment.subcontractor_id,
                            exc.status.as_str(),
                            serde_json::to_string(exc)?
                        ],
                    )?;
                }
                ExceptionWrite::Transition { expected, next } => {
                    let updated = conn.execute(
                        "UPDATE exceptions SET status = ?, payload = ? WHERE id = ? AND status = ?",
                        params![
                            next.status.as_str(),
                            serde_json::to_string(next)?,
                            next.id.0 as i64,
                            expected.as_str()
                        ],
                    )?;
                    if updated == 0 {
                        let exists: i64 = conn.query_row(
                            "SELECT count(*)::BIGINT FROM exceptions WHERE id = ?",
                            params![next.id.0 as i64],
                            |row| row.get(0),
                        )?;
                        if exists == 0 {
                            return Err(StoreError::NotFound(format!("exception {}", next.id)));
                        }
                        return Err(StoreError::Conflict(format!(
                            "exception {} is no longer {}",
                            next.id, expected
                        )));
                    }
                }
            }
        }

        Ok(receipt)
    }
}

impl ComplianceStore for DuckStore {
    fn register_assignment(
        &self,
        key: &AssignmentKey,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO assignments
             (project_id, subcontractor_id, status, version, latest_verdict, updated_at)
             VALUES (?, ?, ?, 0, NULL, ?)",
            params![
                key.project_id,
                key.subcontractor_id,
                ComplianceStatus::Pending.as_str(),
                at.to_rfc3339()
            ],
        )?;
        Self::read_assignment(&conn, key)
    }

    fn assignment(&self, key: &AssignmentKey) -> Result<Assignment, StoreError> {
        let conn = self.lock()?;
        Self::read_assignment(&conn, key)
    }

    fn exception(&self, id: ExceptionId) -> Result<Exception, StoreError> {
        let conn = self.lock()?;
        Self::query_exceptions(&conn, "SELECT payload FROM exceptions WHERE id = ?", &[&(id.0 as i64)])?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("exception {id}")))
    }

    fn open_exception(&self, key: &AssignmentKey) -> Result<Option<Exception>, StoreError> {
        let conn = self.lock()?;
        Ok(Self::query_exceptions(
            &conn,
            "SELECT payload FROM exceptions
             WHERE project_id = ? AND subcontractor_id = ?
               AND status IN ('pending_approval', 'active')
             ORDER BY id",
            &[&key.project_id, &key.subcontractor_id],
        )?
        .into_iter()
        .next())
    }

    fn exceptions_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<Exception>, StoreError> {
        let conn = self.lock()?;
        Self::query_exceptions(
            &conn,
            "SELECT payload FROM exceptions WHERE project_id = ? AND subcontractor_id = ? ORDER BY id",
            &[&key.project_id, &key.subcontractor_id],
        )
    }

    fn due_exceptions(&self, as_of: DateTime<Utc>) -> Result<Vec<Exception>, StoreError> {
        let conn = self.lock()?;
        let active = Self::query_exceptions(
            &conn,
            "SELECT payload FROM exceptions WHERE status = ? ORDER BY id",
            &[&ExceptionStatus::Active.as_str()],
        )?;
        Ok(active.into_iter().filter(|e| e.is_due(as_of)).collect())
    }

    fn verdict_for_document(&self, document_id: &str) -> Result<Option<VerdictRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(Self::query_verdicts(
            &conn,
            "SELECT payload FROM verdicts WHERE document_id = ? ORDER BY id DESC LIMIT 1",
            &[&document_id],
        )?
        .into_iter()
        .next())
    }

    fn verdicts_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<VerdictRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_verdicts(
            &conn,
            "SELECT payload FROM verdicts WHERE project_id = ? AND subcontractor_id = ? ORDER BY id",
            &[&key.project_id, &key.subcontractor_id],
        )
    }

    fn verdicts_for_policy(&self, policy_number: &str) -> Result<Vec<VerdictRecord>, StoreError> {
        let conn = self.lock()?;
        let normalized = normalize_identifier(policy_number);
        Self::query_verdicts(
            &conn,
            "SELECT payload FROM verdicts WHERE policy_number = ? ORDER BY id",
            &[&normalized],
        )
    }

    fn allocate_verdict_id(&self) -> Result<VerdictId, StoreError> {
        self.next_id("verdict_ids").map(VerdictId)
    }

    fn allocate_exception_id(&self) -> Result<ExceptionId, StoreError> {
        self.next_id("exception_ids").map(ExceptionId)
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        match Self::apply(&conn, &changes) {
            Ok(receipt) => {
                conn.execute_batch("COMMIT")?;
                debug!(
                    verdict = changes.verdict.is_some(),
                    exceptions = changes.exceptions.len(),
                    "change set committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("bad timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssignmentWrite;
    use chrono::{Duration, TimeZone};
    use coverwatch_core::{ExpirationType, RiskLevel};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn key() -> AssignmentKey {
        AssignmentKey::new("P1", "S1")
    }

    fn active_exception(id: ExceptionId) -> Exception {
        Exception {
            id,
            assignment: key(),
            status: ExceptionStatus::Active,
            risk_level: RiskLevel::Medium,
            expiration_type: ExpirationType::SpecificDate,
            expires_at: Some(now() + Duration::days(1)),
            resolution_type: None,
            reason: "broker renewal pending".into(),
            requested_by: "pm".into(),
            decided_by: Some("admin".into()),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn register_and_read() {
        let store = DuckStore::open().unwrap();
        let a = store.register_assignment(&key(), now()).unwrap();
        assert_eq!(a.status, ComplianceStatus::Pending);
        assert_eq!(a.updated_at, now());
        // Second registration keeps the row.
        assert_eq!(store.register_assignment(&key(), now()).unwrap(), a);
    }

    #[test]
    fn version_check_conflicts() {
        let store = DuckStore::open().unwrap();
        store.register_assignment(&key(), now()).unwrap();

        let write = |v| {
            let mut changes = ChangeSet::new(now());
            changes.assignment = Some(AssignmentWrite {
                key: key(),
                expected_version: v,
                status: ComplianceStatus::Compliant,
                latest_verdict: Some(VerdictId(4)),
            });
            changes
        };

        let receipt = store.commit(write(0)).unwrap();
        let after = receipt.assignment.unwrap();
        assert_eq!(after.version, 1);
        assert_eq!(after.latest_verdict, Some(VerdictId(4)));
        assert!(store.commit(write(0)).unwrap_err().is_conflict());
    }

    #[test]
    fn rollback_on_failed_exception_transition() {
        let store = DuckStore::open().unwrap();
        store.register_assignment(&key(), now()).unwrap();

        let mut changes = ChangeSet::new(now());
        changes.assignment = Some(AssignmentWrite {
            key: key(),
            expected_version: 0,
            status: ComplianceStatus::Compliant,
            latest_verdict: None,
        });
        let mut missing = active_exception(ExceptionId(42));
        missing.status = ExceptionStatus::Resolved;
        changes.exceptions.push(ExceptionWrite::Transition {
            expected: ExceptionStatus::Active,
            next: missing,
        });

        let err = store.commit(changes).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!err.is_conflict());
        assert_eq!(store.assignment(&key()).unwrap().version, 0);
    }

    #[test]
    fn stale_transition_conflicts() {
        let store = DuckStore::open().unwrap();
        let id = store.allocate_exception_id().unwrap();
        let mut insert = ChangeSet::new(now());
        insert.exceptions.push(ExceptionWrite::Insert(active_exception(id)));
        store.commit(insert).unwrap();

        let mut expired = active_exception(id);
        expired.status = ExceptionStatus::Expired;
        let mut expire = ChangeSet::new(now());
        expire.exceptions.push(ExceptionWrite::Transition {
            expected: ExceptionStatus::Active,
            next: expired,
        });
        store.commit(expire.clone()).unwrap();

        assert!(store.commit(expire).unwrap_err().is_conflict());
        assert_eq!(store.exception(id).unwrap().status, ExceptionStatus::Expired);
    }

    #[test]
    fn exception_roundtrip_and_due() {
        let store = DuckStore::open().unwrap();
        let id = store.allocate_exception_id().unwrap();
        let mut changes = ChangeSet::new(now());
        changes.exceptions.push(ExceptionWrite::Insert(active_exception(id)));
        store.commit(changes).unwrap();

        assert_eq!(store.exception(id).unwrap(), active_exception(id));
        assert_eq!(store.open_exception(&key()).unwrap().unwrap().id, id);
        assert!(store.due_exceptions(now()).unwrap().is_empty());
        assert_eq!(store.due_exceptions(now() + Duration::days(2)).unwrap().len(), 1);
    }

    #[test]
    fn sequences_are_monotonic() {
        let store = DuckStore::open().unwrap();
        let a = store.allocate_verdict_id().unwrap();
        let b = store.allocate_verdict_id().unwrap();
        assert!(b > a);
    }

    #[test]
    fn persistent_reopen_keeps_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("coverwatch.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        store.register_assignment(&key(), now()).unwrap();
        let mut changes = ChangeSet::new(now());
        changes.assignment = Some(AssignmentWrite {
            key: key(),
            expected_version: 0,
            status: ComplianceStatus::NonCompliant,
            latest_verdict: None,
        });
        store.commit(changes).unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        let a = store.assignment(&key()).unwrap();
        assert_eq!(a.status, ComplianceStatus::NonCompliant);
        assert_eq!(a.version, 1);
    }
}
