use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::{
    error::{ServiceError, ServiceResult},
    guard::LeaveTransitionGuard,
    model::{
        leave_request::{LeaveFilter, LeaveRequest, NewLeave},
        page::{Page, Paged},
    },
    store::Store,
};

const MAX_REASON_LEN: usize = 255;

pub struct LeaveService {
    store: Arc<dyn Store>,
    guard: LeaveTransitionGuard,
}

impl LeaveService {
    pub fn new(store: Arc<dyn Store>, guard: LeaveTransitionGuard) -> Self {
        Self { store, guard }
    }

    /// Files a new PENDING request.
    pub async fn apply(
        &self,
        employee_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
    ) -> ServiceResult<LeaveRequest> {
        if start_date > end_date {
            return Err(ServiceError::Validation(
                "start_date must not be after end_date".into(),
            ));
        }
        let reason = reason.trim().to_string();
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(ServiceError::Validation(format!(
                "reason must be at most {MAX_REASON_LEN} characters"
            )));
        }
        if self.store.find_employee(employee_id).await?.is_none() {
            return Err(ServiceError::NotFound("employee"));
        }

        let leave = self
            .store
            .create_leave(NewLeave {
                employee_id,
                start_date,
                end_date,
                reason,
            })
            .await?;

        info!(leave_id = leave.id, employee_id, "Leave applied");
        Ok(leave)
    }

    pub async fn get(&self, id: u64) -> ServiceResult<LeaveRequest> {
        self.store
            .find_leave(id)
            .await?
            .ok_or(ServiceError::NotFound("leave request"))
    }

    pub async fn list_mine(&self, employee_id: u64) -> ServiceResult<Vec<LeaveRequest>> {
        Ok(self.store.list_leaves_for(employee_id).await?)
    }

    pub async fn list_all(
        &self,
        filter: LeaveFilter,
        page: Page,
    ) -> ServiceResult<Paged<LeaveRequest>> {
        let (data, total) = self.store.list_leaves(filter, page).await?;
        Ok(Paged::new(data, page, total))
    }

    pub async fn approve(&self, id: u64) -> ServiceResult<LeaveRequest> {
        self.guard.approve(id).await
    }

    pub async fn reject(&self, id: u64) -> ServiceResult<LeaveRequest> {
        self.guard.reject(id).await
    }

    pub async fn withdraw(&self, id: u64, employee_id: u64) -> ServiceResult<()> {
        self.guard.withdraw(id, employee_id).await
    }
}
