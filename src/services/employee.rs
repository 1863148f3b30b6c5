use std::sync::Arc;

use tracing::info;

use crate::{
    error::{ServiceError, ServiceResult},
    model::{
        employee::{Employee, EmployeePatch, NewEmployee},
        page::{Page, Paged},
    },
    store::{Store, StoreError},
};

/// Plain CRUD over employee profiles; no version checks on this path.
pub struct EmployeeService {
    store: Arc<dyn Store>,
}

impl EmployeeService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, employee: NewEmployee) -> ServiceResult<Employee> {
        validate_text("name", &employee.name)?;
        validate_text("position", &employee.position)?;
        validate_text("department", &employee.department)?;
        validate_salary(employee.salary)?;

        if self.store.find_user(employee.user_id).await?.is_none() {
            return Err(ServiceError::NotFound("user"));
        }

        let created = self
            .store
            .create_employee(employee)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => {
                    ServiceError::Conflict("user already has an employee profile")
                }
                other => other.into(),
            })?;

        info!(employee_id = created.id, user_id = created.user_id, "Employee created");
        Ok(created)
    }

    pub async fn get(&self, id: u64) -> ServiceResult<Employee> {
        self.store
            .find_employee(id)
            .await?
            .ok_or(ServiceError::NotFound("employee"))
    }

    /// Profile linked to a login account.
    pub async fn for_user(&self, user_id: u64) -> ServiceResult<Employee> {
        self.store
            .find_employee_by_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("employee profile"))
    }

    pub async fn update(&self, id: u64, patch: EmployeePatch) -> ServiceResult<Employee> {
        if patch.is_empty() {
            return Err(ServiceError::Validation("no fields provided for update".into()));
        }
        if let Some(name) = &patch.name {
            validate_text("name", name)?;
        }
        if let Some(position) = &patch.position {
            validate_text("position", position)?;
        }
        if let Some(department) = &patch.department {
            validate_text("department", department)?;
        }
        if let Some(salary) = patch.salary {
            validate_salary(salary)?;
        }

        self.store
            .update_employee(id, &patch)
            .await?
            .ok_or(ServiceError::NotFound("employee"))
    }

    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        if !self.store.delete_employee(id).await? {
            return Err(ServiceError::NotFound("employee"));
        }
        info!(employee_id = id, "Employee deleted");
        Ok(())
    }

    pub async fn list(&self, page: Page) -> ServiceResult<Paged<Employee>> {
        let (data, total) = self.store.list_employees(page).await?;
        Ok(Paged::new(data, page, total))
    }
}

const MAX_TEXT_LEN: usize = 120;

fn validate_text(field: &str, value: &str) -> ServiceResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_salary(salary: f64) -> ServiceResult<()> {
    if !salary.is_finite() || salary < 0.0 {
        return Err(ServiceError::Validation(
            "salary must be a non-negative number".into(),
        ));
    }
    Ok(())
}
