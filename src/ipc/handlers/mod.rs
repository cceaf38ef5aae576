pub mod backup;
pub mod checkin;
pub mod core;
pub mod dashboard;
pub mod logs;
pub mod registration;
pub mod students;
