use crate::{
    api::own_employee_id,
    auth::auth::AuthUser,
    context::AppContext,
    model::{
        attendance::AttendanceStatus,
        page::{Page, PageQuery},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RecordAttendance {
    /// Defaults to today (UTC)
    #[schema(example = "2024-05-01", format = "date", value_type = String, nullable)]
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAttendance {
    pub status: AttendanceStatus,
}

/// Record (or re-record) own attendance for a day
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = RecordAttendance,
    responses(
        (status = 200, description = "Attendance stored; version starts at 1 and grows with each write", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No employee profile for this user"),
        (status = 409, description = "Concurrent write detected, resubmit", body = Object, example = json!({
            "error": "conflict",
            "message": "attendance was modified concurrently, please resubmit"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_attendance(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    payload: web::Json<RecordAttendance>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    let date = payload.date.unwrap_or_else(|| Utc::now().date_naive());

    let record = ctx
        .attendance
        .record(employee_id, date, payload.status)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Own attendance history, newest day first
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    responses(
        (status = 200, description = "Own attendance records", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No employee profile for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_my_attendance(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    let records = ctx.attendance.list_mine(employee_id).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/day/{date}",
    params(("date" = String, Path, description = "Day as YYYY-MM-DD")),
    responses(
        (status = 200, description = "Own record for that day", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Nothing recorded for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_my_attendance_for_day(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<NaiveDate>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    let record = ctx.attendance.get(employee_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// All attendance records (HR)
#[utoipa::path(
    get,
    path = "/api/v1/attendance/all",
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendancePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_all_attendance(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    query: web::Query<PageQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let page = ctx.attendance.list_all(Page::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Overwrite the status of any record (HR)
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Attendance updated", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Concurrent write detected, resubmit")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;

    let record = ctx
        .attendance
        .update_any(path.into_inner(), payload.status)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance deleted", body = Object, example = json!({
            "message": "Attendance deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Record not found or not owned by caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&ctx, &auth).await?;
    ctx.attendance
        .delete_mine(path.into_inner(), employee_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance deleted" })))
}
