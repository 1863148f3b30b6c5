//! Persistence seam shared by the services.
//!
//! [`Store`] carries the plain CRUD paths; [`Transactional`] hands out a
//! [`StoreTx`] for the read-then-conditional-write sequences of the guards.
//! A transaction that is dropped without [`StoreTx::commit`] rolls back.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    leave_request::{LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
    page::Page,
    user::{NewUser, User},
};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key rejected the write, e.g. a second attendance row for the
    /// same (employee, date).
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("transaction already finished")]
    TxFinished,

    #[error("invalid column value: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation;
            }
        }
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// Operations available inside one transaction.
///
/// Conditional writes return the number of affected rows; zero means the
/// predicate (usually `version = expected`) no longer matched.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;

    async fn find_attendance_by_id(&mut self, id: u64) -> StoreResult<Option<AttendanceRecord>>;

    async fn insert_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StoreResult<AttendanceRecord>;

    async fn update_attendance_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: AttendanceStatus,
    ) -> StoreResult<u64>;

    async fn find_leave(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>>;

    async fn update_leave_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: LeaveStatus,
    ) -> StoreResult<u64>;

    async fn delete_leave(
        &mut self,
        id: u64,
        employee_id: u64,
        status: LeaveStatus,
        expected_version: u32,
    ) -> StoreResult<u64>;

    async fn commit(&mut self) -> StoreResult<()>;
}

#[async_trait]
pub trait Store: Transactional {
    // users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: u64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_usernames(&self) -> StoreResult<Vec<String>>;
    async fn recent_usernames(&self, limit: u32) -> StoreResult<Vec<String>>;

    // employees
    async fn create_employee(&self, employee: NewEmployee) -> StoreResult<Employee>;
    async fn find_employee(&self, id: u64) -> StoreResult<Option<Employee>>;
    async fn find_employee_by_user(&self, user_id: u64) -> StoreResult<Option<Employee>>;
    async fn update_employee(&self, id: u64, patch: &EmployeePatch)
    -> StoreResult<Option<Employee>>;
    async fn delete_employee(&self, id: u64) -> StoreResult<bool>;
    async fn list_employees(&self, page: Page) -> StoreResult<(Vec<Employee>, i64)>;

    // attendance
    async fn find_attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;
    async fn list_attendance_for(&self, employee_id: u64) -> StoreResult<Vec<AttendanceRecord>>;
    async fn list_attendance(&self, page: Page) -> StoreResult<(Vec<AttendanceRecord>, i64)>;
    async fn delete_attendance(&self, id: u64, employee_id: u64) -> StoreResult<bool>;

    // leave
    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest>;
    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    async fn list_leaves_for(&self, employee_id: u64) -> StoreResult<Vec<LeaveRequest>>;
    async fn list_leaves(
        &self,
        filter: LeaveFilter,
        page: Page,
    ) -> StoreResult<(Vec<LeaveRequest>, i64)>;
}
