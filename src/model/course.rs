use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: u64,
    pub name: String,
    pub code: String,
    /// Master programme the course belongs to; enrollments are per programme.
    pub program_id: u64,
    pub instructor_id: Option<u64>,
}
