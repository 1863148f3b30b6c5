use crate::api::attendance::{RecordAttendance, UpdateAttendance};
use crate::api::leave_request::{CreateLeave, LeaveListQuery};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    leave_request::{LeaveRequest, LeaveStatus},
    page::{AttendancePage, EmployeePage, LeavePage, PageQuery},
    role::Role,
};
use crate::models::{LoginReqDto, RefreshReq, RegisterReq, TokenPair};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "1.0.0",
        description = r#"
## Human Resource Management (HRM) System

Employee records, daily attendance and leave requests.

### Concurrency
Attendance and leave records carry a `version` that grows by one with every
status write. A write that raced with another one is answered with
**409 Conflict**; re-read and resubmit. A leave request that was already
approved or rejected is answered with **400 invalid_transition**.

### Security
Most endpoints are protected using **JWT Bearer authentication**.
Only the **HR** role can access sensitive operations.

### Errors
`{"error": "<kind>", "message": "<text>"}` where kind is one of
`not_found`, `conflict`, `invalid_transition`, `validation`, `storage`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_me,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::record_attendance,
        crate::api::attendance::list_my_attendance,
        crate::api::attendance::get_my_attendance_for_day,
        crate::api::attendance::list_all_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::list_my_leaves,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::withdraw_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            RefreshReq,
            TokenPair,
            Role,
            Employee,
            NewEmployee,
            EmployeePatch,
            EmployeePage,
            AttendanceStatus,
            AttendanceRecord,
            AttendancePage,
            RecordAttendance,
            UpdateAttendance,
            LeaveStatus,
            LeaveRequest,
            LeavePage,
            CreateLeave,
            LeaveListQuery,
            PageQuery
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and tokens"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
