pub mod attendance;
pub mod employee;
pub mod leave;

pub use attendance::AttendanceService;
pub use employee::EmployeeService;
pub use leave::LeaveService;
