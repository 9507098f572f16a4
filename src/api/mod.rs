pub mod absences;
pub mod attendance;
pub mod recognition;
