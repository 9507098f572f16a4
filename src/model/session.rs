use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: u64,
    pub course_id: u64,
    pub session_date: NaiveDate,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub room: Option<String>,
    /// Set once by closeout, never cleared.
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SessionSummary {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = 3)]
    pub course_id: u64,
    #[schema(example = "2026-01-12", format = "date", value_type = String)]
    pub session_date: NaiveDate,
    #[schema(example = "08:30:00", value_type = String)]
    pub starts_at: NaiveTime,
    #[schema(example = "10:30:00", value_type = String)]
    pub ends_at: NaiveTime,
    #[schema(example = "B12", nullable = true)]
    pub room: Option<String>,
    pub closed: bool,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            course_id: s.course_id,
            session_date: s.session_date,
            starts_at: s.starts_at,
            ends_at: s.ends_at,
            room: s.room.clone(),
            closed: s.closed,
        }
    }
}

#[cfg(test)]
pub(crate) fn session(id: u64, course_id: u64) -> Session {
    Session {
        id,
        course_id,
        session_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
        starts_at: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        ends_at: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        room: Some("B12".into()),
        closed: false,
    }
}
