pub mod audit_log;
pub mod deadline_check;
pub mod export;
pub mod leave_balance;
pub mod notifier;
pub mod payroll;
pub mod time_calculation;
