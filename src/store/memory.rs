//! Process-local store used for `DATABASE_URL=memory://` and tests.
//!
//! Transactions write straight into the shared tables and keep an undo log,
//! so a dropped transaction restores what it touched. There is no isolation
//! beyond that: concurrent transactions see each other's uncommitted rows,
//! which is enough for the version-qualified writes to detect races. An undo
//! step only applies while the row still carries the version this
//! transaction wrote; a row another transaction has since moved on is left
//! alone.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{Store, StoreError, StoreResult, StoreTx, Transactional};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    leave_request::{LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
    page::Page,
    user::{NewUser, User},
};

#[derive(Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<u64, User>,
    employees: BTreeMap<u64, Employee>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    leaves: BTreeMap<u64, LeaveRequest>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn attendance_by_key(&self, employee_id: u64, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.attendance
            .values()
            .find(|r| r.employee_id == employee_id && r.date == date)
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.per_page as usize)
        .collect();
    (data, total)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables)
    }
}

enum Undo {
    RemoveAttendance {
        id: u64,
        written: u32,
    },
    RestoreAttendance {
        before: AttendanceRecord,
        written: u32,
    },
    RestoreLeave {
        before: LeaveRequest,
        written: u32,
    },
    /// Re-insert a deleted leave unless the id is taken again.
    ReinsertLeave(LeaveRequest),
}

pub struct MemoryTx {
    tables: Arc<Mutex<Tables>>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    fn with<R>(&mut self, f: impl FnOnce(&mut Tables, &mut Vec<Undo>) -> R) -> StoreResult<R> {
        if self.finished {
            return Err(StoreError::TxFinished);
        }
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut tables, &mut self.undo))
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.finished || self.undo.is_empty() {
            return;
        }
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::RemoveAttendance { id, written } => {
                    if tables.attendance.get(&id).is_some_and(|r| r.version == written) {
                        tables.attendance.remove(&id);
                    }
                }
                Undo::RestoreAttendance { before, written } => {
                    if let Some(current) = tables.attendance.get_mut(&before.id) {
                        if current.version == written {
                            *current = before;
                        }
                    }
                }
                Undo::RestoreLeave { before, written } => {
                    if let Some(current) = tables.leaves.get_mut(&before.id) {
                        if current.version == written {
                            *current = before;
                        }
                    }
                }
                Undo::ReinsertLeave(leave) => {
                    tables.leaves.entry(leave.id).or_insert(leave);
                }
            }
        }
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            tables: self.tables.clone(),
            undo: Vec::new(),
            finished: false,
        }))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        self.with(|t, _| t.attendance_by_key(employee_id, date).cloned())
    }

    async fn find_attendance_by_id(&mut self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        self.with(|t, _| t.attendance.get(&id).cloned())
    }

    async fn insert_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StoreResult<AttendanceRecord> {
        self.with(|t, undo| {
            if t.attendance_by_key(employee_id, date).is_some() {
                return Err(StoreError::UniqueViolation);
            }
            let now = Utc::now();
            let record = AttendanceRecord {
                id: t.next_id(),
                employee_id,
                date,
                status,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            t.attendance.insert(record.id, record.clone());
            undo.push(Undo::RemoveAttendance {
                id: record.id,
                written: record.version,
            });
            Ok(record)
        })?
    }

    async fn update_attendance_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: AttendanceStatus,
    ) -> StoreResult<u64> {
        self.with(|t, undo| match t.attendance.get_mut(&id) {
            Some(record) if record.version == expected_version => {
                let before = record.clone();
                record.status = status;
                record.version += 1;
                record.updated_at = Utc::now();
                undo.push(Undo::RestoreAttendance {
                    before,
                    written: record.version,
                });
                1
            }
            _ => 0,
        })
    }

    async fn find_leave(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        self.with(|t, _| t.leaves.get(&id).cloned())
    }

    async fn update_leave_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: LeaveStatus,
    ) -> StoreResult<u64> {
        self.with(|t, undo| match t.leaves.get_mut(&id) {
            Some(leave) if leave.version == expected_version => {
                let before = leave.clone();
                leave.status = status;
                leave.version += 1;
                leave.updated_at = Utc::now();
                undo.push(Undo::RestoreLeave {
                    before,
                    written: leave.version,
                });
                1
            }
            _ => 0,
        })
    }

    async fn delete_leave(
        &mut self,
        id: u64,
        employee_id: u64,
        status: LeaveStatus,
        expected_version: u32,
    ) -> StoreResult<u64> {
        self.with(|t, undo| {
            let matches = t.leaves.get(&id).is_some_and(|l| {
                l.employee_id == employee_id && l.status == status && l.version == expected_version
            });
            if !matches {
                return 0;
            }
            if let Some(leave) = t.leaves.remove(&id) {
                undo.push(Undo::ReinsertLeave(leave));
            }
            1
        })
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.finished {
            return Err(StoreError::TxFinished);
        }
        self.finished = true;
        self.undo.clear();
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.with(|t| {
            let taken = t
                .users
                .values()
                .any(|u| u.username.eq_ignore_ascii_case(&user.username));
            if taken {
                return Err(StoreError::UniqueViolation);
            }
            let user = User {
                id: t.next_id(),
                username: user.username,
                password_hash: user.password_hash,
                role: user.role,
                created_at: Utc::now(),
            };
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.with(|t| t.users.get(&id).cloned()))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.with(|t| {
            t.users
                .values()
                .find(|u| u.username.eq_ignore_ascii_case(username))
                .cloned()
        }))
    }

    async fn list_usernames(&self) -> StoreResult<Vec<String>> {
        Ok(self.with(|t| t.users.values().map(|u| u.username.clone()).collect()))
    }

    async fn recent_usernames(&self, limit: u32) -> StoreResult<Vec<String>> {
        Ok(self.with(|t| {
            let mut users: Vec<&User> = t.users.values().collect();
            users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            users
                .into_iter()
                .take(limit as usize)
                .map(|u| u.username.clone())
                .collect()
        }))
    }

    async fn create_employee(&self, employee: NewEmployee) -> StoreResult<Employee> {
        self.with(|t| {
            if t.employees.values().any(|e| e.user_id == employee.user_id) {
                return Err(StoreError::UniqueViolation);
            }
            let now = Utc::now();
            let employee = Employee {
                id: t.next_id(),
                user_id: employee.user_id,
                name: employee.name,
                position: employee.position,
                department: employee.department,
                salary: employee.salary,
                created_at: now,
                updated_at: now,
            };
            t.employees.insert(employee.id, employee.clone());
            Ok(employee)
        })
    }

    async fn find_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.with(|t| t.employees.get(&id).cloned()))
    }

    async fn find_employee_by_user(&self, user_id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.with(|t| t.employees.values().find(|e| e.user_id == user_id).cloned()))
    }

    async fn update_employee(
        &self,
        id: u64,
        patch: &EmployeePatch,
    ) -> StoreResult<Option<Employee>> {
        Ok(self.with(|t| {
            t.employees.get_mut(&id).map(|employee| {
                patch.apply(employee);
                employee.updated_at = Utc::now();
                employee.clone()
            })
        }))
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<bool> {
        Ok(self.with(|t| {
            if t.employees.remove(&id).is_none() {
                return false;
            }
            t.attendance.retain(|_, r| r.employee_id != id);
            t.leaves.retain(|_, l| l.employee_id != id);
            true
        }))
    }

    async fn list_employees(&self, page: Page) -> StoreResult<(Vec<Employee>, i64)> {
        Ok(self.with(|t| {
            let rows: Vec<Employee> = t.employees.values().rev().cloned().collect();
            paginate(rows, page)
        }))
    }

    async fn find_attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.with(|t| t.attendance_by_key(employee_id, date).cloned()))
    }

    async fn list_attendance_for(&self, employee_id: u64) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(self.with(|t| {
            let mut rows: Vec<AttendanceRecord> = t
                .attendance
                .values()
                .filter(|r| r.employee_id == employee_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.date.cmp(&a.date));
            rows
        }))
    }

    async fn list_attendance(&self, page: Page) -> StoreResult<(Vec<AttendanceRecord>, i64)> {
        Ok(self.with(|t| {
            let mut rows: Vec<AttendanceRecord> = t.attendance.values().cloned().collect();
            rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            paginate(rows, page)
        }))
    }

    async fn delete_attendance(&self, id: u64, employee_id: u64) -> StoreResult<bool> {
        Ok(self.with(|t| {
            let owned = t
                .attendance
                .get(&id)
                .is_some_and(|r| r.employee_id == employee_id);
            owned && t.attendance.remove(&id).is_some()
        }))
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        Ok(self.with(|t| {
            let now = Utc::now();
            let leave = LeaveRequest {
                id: t.next_id(),
                employee_id: leave.employee_id,
                start_date: leave.start_date,
                end_date: leave.end_date,
                reason: leave.reason,
                status: LeaveStatus::Pending,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            t.leaves.insert(leave.id, leave.clone());
            leave
        }))
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.with(|t| t.leaves.get(&id).cloned()))
    }

    async fn list_leaves_for(&self, employee_id: u64) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self.with(|t| {
            t.leaves
                .values()
                .rev()
                .filter(|l| l.employee_id == employee_id)
                .cloned()
                .collect()
        }))
    }

    async fn list_leaves(
        &self,
        filter: LeaveFilter,
        page: Page,
    ) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        Ok(self.with(|t| {
            let rows: Vec<LeaveRequest> = t
                .leaves
                .values()
                .rev()
                .filter(|l| filter.employee_id.is_none_or(|id| l.employee_id == id))
                .filter(|l| filter.status.is_none_or(|s| l.status == s))
                .cloned()
                .collect();
            paginate(rows, page)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[actix_web::test]
    async fn dropped_transaction_rolls_back_its_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_attendance(7, day(1), AttendanceStatus::Present)
                .await
                .unwrap();
        }
        assert!(store.find_attendance(7, day(1)).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn committed_transaction_keeps_its_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx
            .insert_attendance(7, day(1), AttendanceStatus::Present)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let stored = store.find_attendance(7, day(1)).await.unwrap().unwrap();
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.version, 1);
    }

    #[actix_web::test]
    async fn rollback_restores_previous_status() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx
            .insert_attendance(7, day(1), AttendanceStatus::Present)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let rows = tx
            .update_attendance_status(record.id, 1, AttendanceStatus::Absent)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        drop(tx);

        let stored = store.find_attendance(7, day(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Present);
        assert_eq!(stored.version, 1);
    }

    #[actix_web::test]
    async fn rollback_keeps_a_later_committed_write() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let record = setup
            .insert_attendance(7, day(1), AttendanceStatus::Present)
            .await
            .unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        first
            .update_attendance_status(record.id, 1, AttendanceStatus::Absent)
            .await
            .unwrap();

        // second transaction builds on the uncommitted version 2 and commits
        let mut second = store.begin().await.unwrap();
        let seen = second.find_attendance_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(seen.version, 2);
        assert_eq!(
            second
                .update_attendance_status(record.id, 2, AttendanceStatus::Present)
                .await
                .unwrap(),
            1
        );
        second.commit().await.unwrap();

        drop(first);

        let stored = store.find_attendance(7, day(1)).await.unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn stale_version_matches_no_rows() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx
            .insert_attendance(7, day(1), AttendanceStatus::Present)
            .await
            .unwrap();
        assert_eq!(
            tx.update_attendance_status(record.id, 1, AttendanceStatus::Absent)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            tx.update_attendance_status(record.id, 1, AttendanceStatus::Present)
                .await
                .unwrap(),
            0
        );
    }

    #[actix_web::test]
    async fn duplicate_attendance_key_is_a_unique_violation() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_attendance(7, day(1), AttendanceStatus::Present)
            .await
            .unwrap();
        let err = tx
            .insert_attendance(7, day(1), AttendanceStatus::Absent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[actix_web::test]
    async fn finished_transaction_rejects_further_use() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(
            tx.find_leave(1).await.unwrap_err(),
            StoreError::TxFinished
        ));
    }

    #[actix_web::test]
    async fn deleting_employee_cascades() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "jane".into(),
                password_hash: "x".into(),
                role: Role::Employee,
            })
            .await
            .unwrap();
        let employee = store
            .create_employee(NewEmployee {
                user_id: user.id,
                name: "Jane".into(),
                position: "Engineer".into(),
                department: "R&D".into(),
                salary: 1.0,
            })
            .await
            .unwrap();
        store
            .create_leave(NewLeave {
                employee_id: employee.id,
                start_date: day(2),
                end_date: day(3),
                reason: String::new(),
            })
            .await
            .unwrap();

        assert!(store.delete_employee(employee.id).await.unwrap());
        assert!(store.list_leaves_for(employee.id).await.unwrap().is_empty());
        assert!(!store.delete_employee(employee.id).await.unwrap());
    }

    #[actix_web::test]
    async fn usernames_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        let new = |name: &str| NewUser {
            username: name.into(),
            password_hash: "x".into(),
            role: Role::Hr,
        };
        store.create_user(new("Boss")).await.unwrap();
        assert!(matches!(
            store.create_user(new("boss")).await.unwrap_err(),
            StoreError::UniqueViolation
        ));
    }
}
