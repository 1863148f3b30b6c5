use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    error::{ServiceError, ServiceResult},
    guard::AttendanceGuard,
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        page::{Page, Paged},
    },
    store::Store,
};

pub struct AttendanceService {
    store: Arc<dyn Store>,
    guard: AttendanceGuard,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn Store>, guard: AttendanceGuard) -> Self {
        Self { store, guard }
    }

    /// Upserts the employee's status for `date`.
    pub async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> ServiceResult<AttendanceRecord> {
        if self.store.find_employee(employee_id).await?.is_none() {
            return Err(ServiceError::NotFound("employee"));
        }
        self.guard.record(employee_id, date, status).await
    }

    pub async fn get(&self, employee_id: u64, date: NaiveDate) -> ServiceResult<AttendanceRecord> {
        self.store
            .find_attendance(employee_id, date)
            .await?
            .ok_or(ServiceError::NotFound("attendance record"))
    }

    pub async fn list_mine(&self, employee_id: u64) -> ServiceResult<Vec<AttendanceRecord>> {
        Ok(self.store.list_attendance_for(employee_id).await?)
    }

    pub async fn list_all(&self, page: Page) -> ServiceResult<Paged<AttendanceRecord>> {
        let (data, total) = self.store.list_attendance(page).await?;
        Ok(Paged::new(data, page, total))
    }

    /// HR correction of any record by id.
    pub async fn update_any(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> ServiceResult<AttendanceRecord> {
        self.guard.overwrite(id, status).await
    }

    /// Deletes one of the employee's own records.
    pub async fn delete_mine(&self, id: u64, employee_id: u64) -> ServiceResult<()> {
        if !self.store.delete_attendance(id, employee_id).await? {
            return Err(ServiceError::NotFound("attendance record"));
        }
        tracing::info!(id, employee_id, "Attendance deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{employee::NewEmployee, role::Role, user::NewUser};
    use crate::store::MemoryStore;

    async fn setup() -> (AttendanceService, u64) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "sam".into(),
                password_hash: "x".into(),
                role: Role::Employee,
            })
            .await
            .unwrap();
        let employee = store
            .create_employee(NewEmployee {
                user_id: user.id,
                name: "Sam".into(),
                position: "Analyst".into(),
                department: "Finance".into(),
                salary: 3000.0,
            })
            .await
            .unwrap();
        let guard = AttendanceGuard::new(Arc::new(store.clone()));
        (AttendanceService::new(Arc::new(store), guard), employee.id)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[actix_web::test]
    async fn unknown_employee_cannot_record() {
        let (service, _) = setup().await;
        let err = service
            .record(9999, day(3), AttendanceStatus::Present)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("employee")));
    }

    #[actix_web::test]
    async fn record_then_get_returns_latest_status() {
        let (service, employee_id) = setup().await;
        service
            .record(employee_id, day(3), AttendanceStatus::Present)
            .await
            .unwrap();
        service
            .record(employee_id, day(3), AttendanceStatus::Absent)
            .await
            .unwrap();

        let record = service.get(employee_id, day(3)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert_eq!(record.version, 2);
        assert!(matches!(
            service.get(employee_id, day(4)).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[actix_web::test]
    async fn listing_pages_through_all_records() {
        let (service, employee_id) = setup().await;
        for d in 1..=3 {
            service
                .record(employee_id, day(d), AttendanceStatus::Present)
                .await
                .unwrap();
        }

        assert_eq!(service.list_mine(employee_id).await.unwrap().len(), 3);
        let page = service.list_all(Page::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 1);
    }

    #[actix_web::test]
    async fn only_the_owner_deletes() {
        let (service, employee_id) = setup().await;
        let record = service
            .record(employee_id, day(3), AttendanceStatus::Present)
            .await
            .unwrap();

        assert!(matches!(
            service.delete_mine(record.id, employee_id + 1).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        service.delete_mine(record.id, employee_id).await.unwrap();
        assert!(service.list_mine(employee_id).await.unwrap().is_empty());
    }
}
