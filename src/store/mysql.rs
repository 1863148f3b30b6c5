use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySql, MySqlConnection, MySqlPool, QueryBuilder, Transaction};

use super::{Store, StoreError, StoreResult, StoreTx, Transactional};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    leave_request::{LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
    page::Page,
    role::Role,
    user::{NewUser, User},
};

const ATTENDANCE_COLUMNS: &str =
    "id, employee_id, date, status, version, created_at, updated_at";
const LEAVE_COLUMNS: &str =
    "id, employee_id, start_date, end_date, reason, status, version, created_at, updated_at";
const EMPLOYEE_COLUMNS: &str =
    "id, user_id, name, position, department, salary, created_at, updated_at";

fn parse_enum<T: FromStr>(column: &str, value: &str) -> StoreResult<T> {
    T::from_str(value).map_err(|_| StoreError::Decode(format!("{column} = {value:?}")))
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role: parse_enum::<Role>("users.role", &row.role)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    status: String,
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> StoreResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            status: parse_enum::<AttendanceStatus>("attendance.status", &row.status)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    status: String,
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> StoreResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status: parse_enum::<LeaveStatus>("leaves.status", &row.status)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EmployeeRow {
    id: u64,
    user_id: u64,
    name: String,
    position: String,
    department: String,
    salary: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            position: row.position,
            department: row.department,
            salary: row.salary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

pub struct MySqlTx {
    tx: Option<Transaction<'static, MySql>>,
}

impl MySqlTx {
    fn conn(&mut self) -> StoreResult<&mut MySqlConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TxFinished)
    }
}

#[async_trait]
impl Transactional for MySqlStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTx { tx: Some(tx) }))
    }
}

#[async_trait]
impl StoreTx for MySqlTx {
    async fn find_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(self.conn()?)
            .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn find_attendance_by_id(&mut self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn insert_attendance(
        &mut self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StoreResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, status, version)
            VALUES (?, ?, ?, 1)
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(status.as_ref())
        .execute(self.conn()?)
        .await?;

        let id = result.last_insert_id();
        self.find_attendance_by_id(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("attendance {id} vanished after insert")))
    }

    async fn update_attendance_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: AttendanceStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?, version = version + 1
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(status.as_ref())
        .bind(id)
        .bind(expected_version)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_leave(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }

    async fn update_leave_status(
        &mut self,
        id: u64,
        expected_version: u32,
        status: LeaveStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE leaves
            SET status = ?, version = version + 1
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(status.as_ref())
        .bind(id)
        .bind(expected_version)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_leave(
        &mut self,
        id: u64,
        employee_id: u64,
        status: LeaveStatus,
        expected_version: u32,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM leaves
            WHERE id = ?
            AND employee_id = ?
            AND status = ?
            AND version = ?
            "#,
        )
        .bind(id)
        .bind(employee_id)
        .bind(status.as_ref())
        .bind(expected_version)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TxFinished)?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let result = sqlx::query(
            r#"INSERT INTO users (username, password_hash, role) VALUES (?, ?, ?)"#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.find_user(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("user {id} vanished after insert")))
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, role, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, role, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_usernames(&self) -> StoreResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>("SELECT username FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn recent_usernames(&self, limit: u32) -> StoreResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT username
            FROM users
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_employee(&self, employee: NewEmployee) -> StoreResult<Employee> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees (user_id, name, position, department, salary)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee.user_id)
        .bind(&employee.name)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(employee.salary)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.find_employee(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("employee {id} vanished after insert")))
    }

    async fn find_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Employee::from))
    }

    async fn find_employee_by_user(&self, user_id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE user_id = ?");
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Employee::from))
    }

    async fn update_employee(
        &self,
        id: u64,
        patch: &EmployeePatch,
    ) -> StoreResult<Option<Employee>> {
        let mut builder = QueryBuilder::<MySql>::new("UPDATE employees SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(position) = &patch.position {
            set.push("position = ").push_bind_unseparated(position);
        }
        if let Some(department) = &patch.department {
            set.push("department = ").push_bind_unseparated(department);
        }
        if let Some(salary) = patch.salary {
            set.push("salary = ").push_bind_unseparated(salary);
        }
        builder.push(" WHERE id = ").push_bind(id);

        // MySQL reports zero affected rows when the values are unchanged,
        // so existence is decided by the re-read.
        builder.build().execute(&self.pool).await?;
        self.find_employee(id).await
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_employees(&self, page: Page) -> StoreResult<(Vec<Employee>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.pool)
            .await?;

        let sql =
            format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY id DESC LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows.into_iter().map(Employee::from).collect(), total))
    }

    async fn find_attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn list_attendance_for(&self, employee_id: u64) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? ORDER BY date DESC"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn list_attendance(&self, page: Page) -> StoreResult<(Vec<AttendanceRecord>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((convert_all(rows)?, total))
    }

    async fn delete_attendance(&self, id: u64, employee_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ? AND employee_id = ?")
            .bind(id)
            .bind(employee_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leaves (employee_id, start_date, end_date, reason, status, version)
            VALUES (?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(leave.employee_id)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(&leave.reason)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.find_leave(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("leave {id} vanished after insert")))
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }

    async fn list_leaves_for(&self, employee_id: u64) -> StoreResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves WHERE employee_id = ? ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn list_leaves(
        &self,
        filter: LeaveFilter,
        page: Page,
    ) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        fn push_filter(builder: &mut QueryBuilder<'_, MySql>, filter: &LeaveFilter) {
            builder.push(" WHERE 1=1");
            if let Some(employee_id) = filter.employee_id {
                builder.push(" AND employee_id = ").push_bind(employee_id);
            }
            if let Some(status) = filter.status {
                builder
                    .push(" AND status = ")
                    .push_bind(status.as_ref().to_string());
            }
        }

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM leaves");
        push_filter(&mut count, &filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut data = QueryBuilder::<MySql>::new(format!("SELECT {LEAVE_COLUMNS} FROM leaves"));
        push_filter(&mut data, &filter);
        data.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = data
            .build_query_as::<LeaveRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok((convert_all(rows)?, total))
    }
}
