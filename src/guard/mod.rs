//! Concurrency-guarded state transitions.
//!
//! Each guard takes a process-local keyed lock, reads the current row inside
//! a transaction and writes back with a `version = observed` predicate. A
//! write that matches no rows is reported as a conflict, never retried.

pub mod attendance;
pub mod leave;

pub use attendance::AttendanceGuard;
pub use leave::LeaveTransitionGuard;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Barrier;

    use crate::model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        leave_request::{LeaveRequest, LeaveStatus},
    };
    use crate::store::{MemoryStore, StoreError, StoreResult, StoreTx, Transactional};

    /// Memory store with scripted interference for guard tests.
    #[derive(Clone)]
    pub struct ScriptedDb {
        inner: MemoryStore,
        barrier: Option<Arc<Barrier>>,
        fail_commit: bool,
    }

    impl ScriptedDb {
        /// The first read of every transaction waits until `parties`
        /// transactions have read, forcing the read/read/write/write
        /// interleaving.
        pub fn rendezvous(inner: MemoryStore, parties: usize) -> Self {
            Self {
                inner,
                barrier: Some(Arc::new(Barrier::new(parties))),
                fail_commit: false,
            }
        }

        /// Every commit fails, so the transaction is dropped uncommitted.
        pub fn failing_commit(inner: MemoryStore) -> Self {
            Self {
                inner,
                barrier: None,
                fail_commit: true,
            }
        }
    }

    #[async_trait]
    impl Transactional for ScriptedDb {
        async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
            Ok(Box::new(ScriptedTx {
                inner: self.inner.begin().await?,
                barrier: self.barrier.clone(),
                fail_commit: self.fail_commit,
            }))
        }
    }

    struct ScriptedTx {
        inner: Box<dyn StoreTx>,
        barrier: Option<Arc<Barrier>>,
        fail_commit: bool,
    }

    impl ScriptedTx {
        async fn rendezvous(&mut self) {
            if let Some(barrier) = self.barrier.take() {
                barrier.wait().await;
            }
        }
    }

    #[async_trait]
    impl StoreTx for ScriptedTx {
        async fn find_attendance(
            &mut self,
            employee_id: u64,
            date: NaiveDate,
        ) -> StoreResult<Option<AttendanceRecord>> {
            let found = self.inner.find_attendance(employee_id, date).await?;
            self.rendezvous().await;
            Ok(found)
        }

        async fn find_attendance_by_id(
            &mut self,
            id: u64,
        ) -> StoreResult<Option<AttendanceRecord>> {
            self.inner.find_attendance_by_id(id).await
        }

        async fn insert_attendance(
            &mut self,
            employee_id: u64,
            date: NaiveDate,
            status: AttendanceStatus,
        ) -> StoreResult<AttendanceRecord> {
            self.inner.insert_attendance(employee_id, date, status).await
        }

        async fn update_attendance_status(
            &mut self,
            id: u64,
            expected_version: u32,
            status: AttendanceStatus,
        ) -> StoreResult<u64> {
            self.inner
                .update_attendance_status(id, expected_version, status)
                .await
        }

        async fn find_leave(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
            let found = self.inner.find_leave(id).await?;
            self.rendezvous().await;
            Ok(found)
        }

        async fn update_leave_status(
            &mut self,
            id: u64,
            expected_version: u32,
            status: LeaveStatus,
        ) -> StoreResult<u64> {
            self.inner
                .update_leave_status(id, expected_version, status)
                .await
        }

        async fn delete_leave(
            &mut self,
            id: u64,
            employee_id: u64,
            status: LeaveStatus,
            expected_version: u32,
        ) -> StoreResult<u64> {
            self.inner
                .delete_leave(id, employee_id, status, expected_version)
                .await
        }

        async fn commit(&mut self) -> StoreResult<()> {
            if self.fail_commit {
                return Err(StoreError::Decode("commit refused".into()));
            }
            self.inner.commit().await
        }
    }
}
