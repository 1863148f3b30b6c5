use crate::{
    auth::auth::AuthUser,
    context::AppContext,
    model::{
        employee::{EmployeePatch, NewEmployee},
        page::{Page, PageQuery},
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

/// Create an employee profile for an existing user (HR)
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body(content = NewEmployee, description = "Employee payload", content_type = "application/json"),
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User already has a profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn create_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    payload: web::Json<NewEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let employee = ctx.employees.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    query: web::Query<PageQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let page = ctx.employees.list(Page::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Profile of the logged-in user
#[utoipa::path(
    get,
    path = "/api/v1/employees/me",
    responses(
        (status = 200, description = "Own employee profile", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No employee profile for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_me(auth: AuthUser, ctx: web::Data<AppContext>) -> actix_web::Result<impl Responder> {
    let employee = ctx.employees.for_user(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}",
    params(("id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let employee = ctx.employees.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Partial update; omitted fields keep their value
#[utoipa::path(
    put,
    path = "/api/v1/employees/{id}",
    params(("id" = u64, Path, description = "Employee ID")),
    request_body = EmployeePatch,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Empty or invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
    payload: web::Json<EmployeePatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let employee = ctx
        .employees
        .update(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Deletes the profile together with its attendance and leave history
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{id}",
    params(("id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deleted", body = Object, example = json!({
            "message": "Employee deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn delete_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    ctx.employees.delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Employee deleted" })))
}
