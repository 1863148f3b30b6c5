pub mod attendance;
pub mod employee;
pub mod leave_request;


use crate::{auth::auth::AuthUser, context::AppContext, error::ServiceResult};

/// Employee id behind the caller's login; self-service routes need one.
async fn own_employee_id(ctx: &AppContext, auth: &AuthUser) -> ServiceResult<u64> {
    Ok(ctx.employees.for_user(auth.user_id).await?.id)
}
