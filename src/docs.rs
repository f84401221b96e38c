use crate::api::asset::{AssetDateFilter, AssetDateListResponse, AssetDateResponse, CreateAssetDate};
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::leave_request::{
    CreateLeave, LeaveFilter, LeaveListResponse, LeaveResponse, RejectLeave,
};
use crate::api::overtime::{
    CreateOvertime, OvertimeFilter, OvertimeListResponse, OvertimeResponse, RejectOvertime,
};
use crate::api::payroll::{
    CreatePayroll, EmployeeRejectPayroll, PaginatedPayrollResponse, PayrollQuery, PayrollResponse,
    UpdatePayroll,
};
use crate::model::employee::Employee;
use crate::model::leave_request::{LeaveType, LeaveUnit};
use crate::utils::reminder::SweepStats;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Business Unit Operations Portal API",
        version = "1.0.0",
        description = r#"
## Business Unit Operations Portal

Backend for a multi-tenant operations portal: each record belongs to a
**business unit**, and admins, HR and employees interact through the same API.

### 🔹 Key Features
- **Employee Management**
  - Create, update, list, and view employee profiles per business unit
- **Leave Management**
  - Apply for full-day or half-day leave, overlap-checked at submission
    and again at approval; cancel while pending
- **Overtime Management**
  - Single-day overtime slots with derived hours and the same overlap rules
- **Payroll Management**
  - Generate payslips, send them for employee signature, and walk them
    through the sign/reject/complete lifecycle
- **Asset Date Tracking**
  - Track registration/insurance/rental/warranty dates and let the
    reminder scheduler mail business-unit admins on the configured days

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Admin/HR roles gate the sensitive operations; employees act on their own
records only.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::overtime::overtime_list,
        crate::api::overtime::get_overtime,
        crate::api::overtime::create_overtime,
        crate::api::overtime::approve_overtime,
        crate::api::overtime::reject_overtime,
        crate::api::overtime::cancel_overtime,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::send_for_signature,
        crate::api::payroll::sign_payroll,
        crate::api::payroll::reject_payroll,
        crate::api::payroll::rework_payroll,
        crate::api::payroll::complete_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::asset::create_asset_date,
        crate::api::asset::list_asset_dates,
        crate::api::asset::resolve_asset_date,
        crate::api::asset::run_reminders_now
    ),
    components(
        schemas(
            LeaveType,
            LeaveUnit,
            LeaveFilter,
            LeaveResponse,
            LeaveListResponse,
            CreateLeave,
            RejectLeave,
            OvertimeFilter,
            OvertimeResponse,
            OvertimeListResponse,
            CreateOvertime,
            RejectOvertime,
            CreateEmployee,
            EmployeeQuery,
            Employee,
            EmployeeListResponse,
            PaginatedPayrollResponse,
            PayrollResponse,
            CreatePayroll,
            UpdatePayroll,
            EmployeeRejectPayroll,
            PayrollQuery,
            CreateAssetDate,
            AssetDateFilter,
            AssetDateResponse,
            AssetDateListResponse,
            SweepStats
        )
    ),
    tags(
        (name = "Leave", description = "Leave management APIs"),
        (name = "Overtime", description = "Overtime management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Payroll", description = "Payroll signature workflow APIs"),
        (name = "Assets", description = "Asset date tracking and reminder APIs"),
    )
)]
pub struct ApiDoc;
