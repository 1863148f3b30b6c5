use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::{
    error::{ServiceError, ServiceResult},
    model::attendance::{AttendanceKey, AttendanceRecord, AttendanceStatus},
    store::{StoreError, StoreTx, Transactional},
    utils::keyed_lock::KeyedLocks,
};

const STALE_WRITE: &str = "attendance was modified concurrently, please resubmit";

/// Insert-or-update of an attendance status, serialized per (employee, date)
/// inside this process and checked against the row version across processes.
pub struct AttendanceGuard {
    db: Arc<dyn Transactional>,
    locks: KeyedLocks<AttendanceKey>,
}

impl AttendanceGuard {
    pub fn new(db: Arc<dyn Transactional>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
        }
    }

    /// Creates the record with version 1, or overwrites the status of the
    /// existing one and bumps its version. The caller has already checked
    /// that the employee exists.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> ServiceResult<AttendanceRecord> {
        let key = AttendanceKey { employee_id, date };
        let _lock = self.locks.lock(key).await;

        let mut tx = self.db.begin().await?;
        let record = match tx.find_attendance(employee_id, date).await? {
            None => match tx.insert_attendance(employee_id, date, status).await {
                Ok(record) => record,
                Err(StoreError::UniqueViolation) => {
                    warn!("Attendance insert lost to a concurrent insert");
                    return Err(ServiceError::Conflict(STALE_WRITE));
                }
                Err(e) => return Err(e.into()),
            },
            Some(existing) => Self::write_status(&mut *tx, &existing, status).await?,
        };
        tx.commit().await?;

        info!(id = record.id, version = record.version, "Attendance recorded");
        Ok(record)
    }

    /// Overwrites the status of an existing record by id.
    #[instrument(skip(self))]
    pub async fn overwrite(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> ServiceResult<AttendanceRecord> {
        let key = {
            let mut peek = self.db.begin().await?;
            peek.find_attendance_by_id(id)
                .await?
                .ok_or(ServiceError::NotFound("attendance record"))?
                .key()
        };
        let _lock = self.locks.lock(key).await;

        let mut tx = self.db.begin().await?;
        let existing = tx
            .find_attendance_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("attendance record"))?;
        let record = Self::write_status(&mut *tx, &existing, status).await?;
        tx.commit().await?;

        info!(version = record.version, "Attendance overwritten");
        Ok(record)
    }

    async fn write_status(
        tx: &mut dyn StoreTx,
        existing: &AttendanceRecord,
        status: AttendanceStatus,
    ) -> ServiceResult<AttendanceRecord> {
        let rows = tx
            .update_attendance_status(existing.id, existing.version, status)
            .await?;
        if rows == 0 {
            warn!(
                id = existing.id,
                observed_version = existing.version,
                "Attendance version changed between read and write"
            );
            return Err(ServiceError::Conflict(STALE_WRITE));
        }

        tx.find_attendance_by_id(existing.id)
            .await?
            .ok_or(ServiceError::NotFound("attendance record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::testing::ScriptedDb;
    use crate::store::{MemoryStore, Store};

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn guard_over(store: &MemoryStore) -> AttendanceGuard {
        AttendanceGuard::new(Arc::new(store.clone()))
    }

    #[actix_web::test]
    async fn first_submission_creates_version_one() {
        let store = MemoryStore::new();
        let guard = guard_over(&store);

        let record = guard
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();

        assert_eq!(record.employee_id, 7);
        assert_eq!(record.date, may_first());
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.version, 1);
    }

    #[actix_web::test]
    async fn resubmission_overwrites_and_bumps_version() {
        let store = MemoryStore::new();
        let guard = guard_over(&store);

        guard
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();
        let updated = guard
            .record(7, may_first(), AttendanceStatus::Absent)
            .await
            .unwrap();
        assert_eq!(updated.status, AttendanceStatus::Absent);
        assert_eq!(updated.version, 2);

        let stored = store.find_attendance(7, may_first()).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Absent);
        assert_eq!(stored.version, 2);
        assert_eq!(store.list_attendance_for(7).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn same_status_resubmission_still_bumps_version() {
        let store = MemoryStore::new();
        let guard = guard_over(&store);

        for expected in 1..=3 {
            let record = guard
                .record(7, may_first(), AttendanceStatus::Present)
                .await
                .unwrap();
            assert_eq!(record.version, expected);
        }
    }

    #[actix_web::test]
    async fn concurrent_writes_in_one_process_are_serialized() {
        let store = MemoryStore::new();
        let guard = guard_over(&store);
        guard
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();

        let (a, b) = futures::join!(
            guard.record(7, may_first(), AttendanceStatus::Absent),
            guard.record(7, may_first(), AttendanceStatus::Present),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());

        let stored = store.find_attendance(7, may_first()).await.unwrap().unwrap();
        assert_eq!(stored.version, 3);
    }

    #[actix_web::test]
    async fn lost_update_across_processes_is_a_conflict() {
        let store = MemoryStore::new();
        guard_over(&store)
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();

        // two guards stand in for two server processes: separate lock tables,
        // one database, both reads happen before either write
        let db = ScriptedDb::rendezvous(store.clone(), 2);
        let left = AttendanceGuard::new(Arc::new(db.clone()));
        let right = AttendanceGuard::new(Arc::new(db));

        let (a, b) = futures::join!(
            left.record(7, may_first(), AttendanceStatus::Absent),
            right.record(7, may_first(), AttendanceStatus::Absent),
        );

        let results = [a, b];
        let ok: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
            .count();
        assert_eq!(ok.len(), 1);
        assert_eq!(conflicts, 1);
        assert_eq!(ok[0].version, 2);
        assert_eq!(ok[0].status, AttendanceStatus::Absent);

        let stored = store.find_attendance(7, may_first()).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[actix_web::test]
    async fn racing_first_inserts_yield_one_row_and_one_conflict() {
        let store = MemoryStore::new();
        let db = ScriptedDb::rendezvous(store.clone(), 2);
        let left = AttendanceGuard::new(Arc::new(db.clone()));
        let right = AttendanceGuard::new(Arc::new(db));

        let (a, b) = futures::join!(
            left.record(7, may_first(), AttendanceStatus::Present),
            right.record(7, may_first(), AttendanceStatus::Absent),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert!(
            matches!(a, Err(ServiceError::Conflict(_))) || matches!(b, Err(ServiceError::Conflict(_)))
        );
        assert_eq!(store.list_attendance_for(7).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn overwrite_of_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = guard_over(&store)
            .overwrite(99, AttendanceStatus::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn overwrite_bumps_version_of_existing_record() {
        let store = MemoryStore::new();
        let guard = guard_over(&store);
        let created = guard
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();

        let updated = guard
            .overwrite(created.id, AttendanceStatus::Absent)
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.status, AttendanceStatus::Absent);
    }

    #[actix_web::test]
    async fn failed_commit_of_first_insert_leaves_no_row() {
        let store = MemoryStore::new();
        let guard = AttendanceGuard::new(Arc::new(ScriptedDb::failing_commit(store.clone())));

        let err = guard
            .record(8, may_first(), AttendanceStatus::Present)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(err.kind(), "storage");
        assert!(store.list_attendance_for(8).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn failed_commit_of_update_keeps_previous_state() {
        let store = MemoryStore::new();
        let created = guard_over(&store)
            .record(7, may_first(), AttendanceStatus::Present)
            .await
            .unwrap();
        let failing = AttendanceGuard::new(Arc::new(ScriptedDb::failing_commit(store.clone())));

        let err = failing
            .record(7, may_first(), AttendanceStatus::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        let err = failing
            .overwrite(created.id, AttendanceStatus::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        let stored = store.find_attendance(7, may_first()).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Present);
        assert_eq!(stored.version, 1);
    }
}
