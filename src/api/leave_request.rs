use crate::{
    api::own_employee_id,
    auth::auth::AuthUser,
    context::AppContext,
    error::ServiceError,
    model::{
        leave_request::{LeaveFilter, LeaveStatus},
        page::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Up to 255 characters
    #[schema(example = "Family trip")]
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveListQuery {
    /// Filter by employee ID
    #[schema(example = 7)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 20)]
    pub per_page: Option<u32>,
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leaves",
    request_body(content = CreateLeave, description = "Leave request payload", content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request submitted as PENDING", body = LeaveRequest),
        (status = 400, description = "start_date after end_date or reason too long"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No employee profile for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    let CreateLeave {
        start_date,
        end_date,
        reason,
    } = payload.into_inner();

    let leave = ctx
        .leaves
        .apply(employee_id, start_date, end_date, reason)
        .await?;
    Ok(HttpResponse::Created().json(leave))
}

/// Own leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/v1/leaves",
    responses(
        (status = 200, description = "Own leave requests", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No employee profile for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_my_leaves(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    let leaves = ctx.leaves.list_mine(employee_id).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/// All leave requests (HR)
#[utoipa::path(
    get,
    path = "/api/v1/leaves/all",
    params(LeaveListQuery),
    responses(
        (status = 200, description = "Paginated leave list", body = LeavePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    query: web::Query<LeaveListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let filter = LeaveFilter {
        employee_id: query.employee_id,
        status: query.status,
    };
    let page = Page::new(query.page, query.per_page);

    let leaves = ctx.leaves.list_all(filter, page).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/// Single leave request; employees only see their own
#[utoipa::path(
    get,
    path = "/api/v1/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = ctx.leaves.get(path.into_inner()).await?;

    if !auth.is_hr() && leave.employee_id != own_employee_id(&ctx, &auth).await? {
        return Err(ServiceError::NotFound("leave request").into());
    }

    Ok(HttpResponse::Ok().json(leave))
}

/// Withdraw own request while it is still PENDING
#[utoipa::path(
    delete,
    path = "/api/v1/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to withdraw")),
    responses(
        (status = 200, description = "Leave withdrawn", body = Object, example = json!({
            "message": "Leave withdrawn"
        })),
        (status = 400, description = "Leave request already decided"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Concurrent change detected, resubmit")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn withdraw_leave(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    ctx.leaves.withdraw(path.into_inner(), employee_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave withdrawn" })))
}

/* =========================
Approve leave (HR)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leaves/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 400, description = "Leave request already decided", body = Object, example = json!({
            "error": "invalid_transition",
            "message": "leave request is REJECTED and cannot become APPROVED"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Concurrent decision detected, resubmit")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let leave = ctx.leaves.approve(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (HR)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leaves/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 400, description = "Leave request already decided"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Concurrent decision detected, resubmit")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let leave = ctx.leaves.reject(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leave))
}
