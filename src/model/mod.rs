pub mod absence;
pub mod attendance;
pub mod course;
pub mod enrollment;
pub mod role;
pub mod session;
pub mod student;
