//! Storage seam for sessions, rosters and attendance determinations.
//!
//! The relational store is the only state shared between requests. Inserts of
//! attendance and absence rows are guarded per (session, student): a second
//! insert for a pair that already holds either determination fails with
//! [`StoreError::DuplicateAttendance`] instead of writing a row.

pub mod mysql;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    absence::{Absence, AbsenceReview, Justification, NewReview},
    attendance::{Attendance, Determination},
    course::Course,
    session::Session,
    student::Student,
};

pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Lost an insert race, or the pair already holds a determination.
    #[error("attendance already determined for session {session_id}, student {student_id}")]
    DuplicateAttendance { session_id: u64, student_id: u64 },

    /// The insert was refused as a duplicate, yet neither record exists.
    #[error("insert refused for session {session_id}, student {student_id} but no determination exists")]
    Unsettled { session_id: u64, student_id: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn get_session(&self, session_id: u64) -> StoreResult<Option<Session>>;

    async fn get_course(&self, course_id: u64) -> StoreResult<Option<Course>>;

    async fn get_student(&self, student_id: u64) -> StoreResult<Option<Student>>;

    /// Active students holding an approved enrollment in the programme, by id.
    async fn approved_students(&self, program_id: u64) -> StoreResult<Vec<Student>>;

    /// Which record, if any, exists for the pair.
    async fn determination(
        &self,
        session_id: u64,
        student_id: u64,
    ) -> StoreResult<Option<Determination>>;

    async fn attendances_for_session(&self, session_id: u64) -> StoreResult<Vec<Attendance>>;

    /// Inserts a presence unless the pair already has a presence or an absence.
    async fn insert_attendance(&self, session_id: u64, student_id: u64) -> StoreResult<u64>;

    /// Inserts a pending absence unless the pair already has a presence or an absence.
    async fn insert_absence(&self, session_id: u64, student_id: u64) -> StoreResult<u64>;

    /// Flips `closed` to true. Returns false when the session does not exist.
    async fn mark_session_closed(&self, session_id: u64) -> StoreResult<bool>;

    async fn get_absence(&self, absence_id: u64) -> StoreResult<Option<Absence>>;

    async fn absences_for_session(&self, session_id: u64) -> StoreResult<Vec<Absence>>;

    async fn absences_by_state(&self, state: Justification) -> StoreResult<Vec<Absence>>;

    /// Sets the evidence reference and timestamp (`submission.created_at`),
    /// resets the state to pending and appends `submission` to the review
    /// trail, all or nothing. Returns false when the absence does not exist.
    async fn record_evidence(&self, file_ref: &str, submission: NewReview) -> StoreResult<bool>;

    /// Stores the decision with `review.comment` and appends `review` to the
    /// trail, all or nothing. Returns false when the absence does not exist.
    async fn record_decision(&self, state: Justification, review: NewReview) -> StoreResult<bool>;

    /// Trail entries are never updated or deleted.
    async fn reviews_for(&self, absence_id: u64) -> StoreResult<Vec<AbsenceReview>>;
}
