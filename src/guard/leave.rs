use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    error::{ServiceError, ServiceResult},
    model::leave_request::{LeaveRequest, LeaveStatus},
    store::Transactional,
    utils::keyed_lock::KeyedLocks,
};

const STALE_WRITE: &str = "leave request was modified concurrently, please resubmit";

/// Guards every status change of a leave request. The status precondition
/// is checked first; the version predicate catches whatever slips past it.
pub struct LeaveTransitionGuard {
    db: Arc<dyn Transactional>,
    locks: KeyedLocks<u64>,
}

impl LeaveTransitionGuard {
    pub fn new(db: Arc<dyn Transactional>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        leave_id: u64,
        required_from: LeaveStatus,
        to: LeaveStatus,
    ) -> ServiceResult<LeaveRequest> {
        if !to.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                from: required_from,
                to,
            });
        }

        let _lock = self.locks.lock(leave_id).await;

        let mut tx = self.db.begin().await?;
        let current = tx
            .find_leave(leave_id)
            .await?
            .ok_or(ServiceError::NotFound("leave request"))?;

        if current.status != required_from {
            return Err(ServiceError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let rows = tx
            .update_leave_status(current.id, current.version, to)
            .await?;
        if rows == 0 {
            warn!(
                observed_version = current.version,
                "Leave version changed between read and write"
            );
            return Err(ServiceError::Conflict(STALE_WRITE));
        }

        let updated = tx
            .find_leave(current.id)
            .await?
            .ok_or(ServiceError::NotFound("leave request"))?;
        tx.commit().await?;

        info!(version = updated.version, status = %updated.status, "Leave transitioned");
        Ok(updated)
    }

    pub async fn approve(&self, leave_id: u64) -> ServiceResult<LeaveRequest> {
        self.transition(leave_id, LeaveStatus::Pending, LeaveStatus::Approved)
            .await
    }

    pub async fn reject(&self, leave_id: u64) -> ServiceResult<LeaveRequest> {
        self.transition(leave_id, LeaveStatus::Pending, LeaveStatus::Rejected)
            .await
    }

    /// Deletes a request on behalf of its owner while it is still pending.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, leave_id: u64, employee_id: u64) -> ServiceResult<()> {
        let _lock = self.locks.lock(leave_id).await;

        let mut tx = self.db.begin().await?;
        let current = tx
            .find_leave(leave_id)
            .await?
            .filter(|leave| leave.employee_id == employee_id)
            .ok_or(ServiceError::NotFound("leave request"))?;

        if current.status != LeaveStatus::Pending {
            return Err(ServiceError::Validation(format!(
                "leave request is {} and can no longer be withdrawn",
                current.status
            )));
        }

        let rows = tx
            .delete_leave(current.id, employee_id, LeaveStatus::Pending, current.version)
            .await?;
        if rows == 0 {
            warn!(
                observed_version = current.version,
                "Leave changed before it could be withdrawn"
            );
            return Err(ServiceError::Conflict(STALE_WRITE));
        }
        tx.commit().await?;

        info!("Leave withdrawn");
        Ok(())
    }
}
