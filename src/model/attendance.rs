use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Presence record; at most one per (session, student).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: u64,
    pub session_id: u64,
    pub student_id: u64,
    pub recorded_at: NaiveDateTime,
}

/// The attendance determination held for a (session, student) pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Determination {
    Present,
    Absent,
}
