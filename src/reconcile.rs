//! Session closeout reconciliation and presence recording.
//!
//! Closeout walks the roster and gives every student without a determination
//! a pending absence, then flips the session to closed. Each student is an
//! independent step: a failed write is reported in the summary and picked up
//! by the next closeout, and a lost insert race counts as already reconciled.
//! Nothing here deletes or overwrites an attendance or absence row.

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::model::{attendance::Determination, session::Session};
use crate::roster::{Roster, roster};
use crate::store::{AttendanceStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SkippedStudent {
    #[schema(example = 42)]
    pub student_id: u64,
    #[schema(example = "database error: pool timed out while waiting for an open connection")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "session_id": 7,
    "reconciled_count": 2,
    "already_present_count": 1,
    "already_absent_count": 0,
    "skipped": []
}))]
pub struct CloseoutSummary {
    pub session_id: u64,
    /// Absences created by this call.
    pub reconciled_count: usize,
    pub already_present_count: usize,
    /// Absences that existed before this call (earlier closeout, or a concurrent one).
    pub already_absent_count: usize,
    pub skipped: Vec<SkippedStudent>,
}

enum StepOutcome {
    Reconciled,
    AlreadyPresent,
    AlreadyAbsent,
}

pub(crate) async fn load_session<S>(store: &S, session_id: u64) -> Result<Session, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    store
        .get_session(session_id)
        .await?
        .ok_or(CoreError::SessionNotFound(session_id))
}

/// After a lost insert race, re-read which record won.
async fn settled<S>(store: &S, session_id: u64, student_id: u64) -> Result<StepOutcome, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    match store.determination(session_id, student_id).await? {
        Some(Determination::Present) => Ok(StepOutcome::AlreadyPresent),
        Some(Determination::Absent) => Ok(StepOutcome::AlreadyAbsent),
        None => Err(StoreError::Unsettled {
            session_id,
            student_id,
        }),
    }
}

async fn reconcile_student<S>(
    store: &S,
    session_id: u64,
    student_id: u64,
) -> Result<StepOutcome, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    match store.determination(session_id, student_id).await? {
        Some(Determination::Present) => return Ok(StepOutcome::AlreadyPresent),
        Some(Determination::Absent) => return Ok(StepOutcome::AlreadyAbsent),
        None => {}
    }

    match store.insert_absence(session_id, student_id).await {
        Ok(absence_id) => {
            debug!(session_id, student_id, absence_id, "Absence recorded");
            Ok(StepOutcome::Reconciled)
        }
        Err(StoreError::DuplicateAttendance { .. }) => {
            debug!(session_id, student_id, "Pair settled concurrently");
            settled(store, session_id, student_id).await
        }
        Err(e) => Err(e),
    }
}

/// Closes a session: every roster student ends with exactly one of
/// {attendance, absence}. Safe to call repeatedly and concurrently.
pub async fn close_session<S>(store: &S, session_id: u64) -> Result<CloseoutSummary, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let session = load_session(store, session_id).await?;
    let roster = roster(store, session.course_id).await?;
    if roster.is_empty() {
        warn!(session_id, course_id = session.course_id, "Closing a session with an empty roster");
    }

    let mut summary = CloseoutSummary {
        session_id,
        reconciled_count: 0,
        already_present_count: 0,
        already_absent_count: 0,
        skipped: Vec::new(),
    };

    for student in &roster.students {
        match reconcile_student(store, session_id, student.id).await {
            Ok(StepOutcome::Reconciled) => summary.reconciled_count += 1,
            Ok(StepOutcome::AlreadyPresent) => summary.already_present_count += 1,
            Ok(StepOutcome::AlreadyAbsent) => summary.already_absent_count += 1,
            Err(e) => {
                warn!(
                    session_id,
                    student_id = student.id,
                    error = %e,
                    "Closeout step failed, student left for retry"
                );
                summary.skipped.push(SkippedStudent {
                    student_id: student.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    if !store.mark_session_closed(session_id).await? {
        return Err(CoreError::SessionNotFound(session_id));
    }

    info!(
        session_id,
        was_closed = session.closed,
        roster = roster.len(),
        reconciled = summary.reconciled_count,
        already_present = summary.already_present_count,
        already_absent = summary.already_absent_count,
        skipped = summary.skipped.len(),
        "Session closed"
    );

    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PresenceRecorded {
    pub session_id: u64,
    pub student_id: u64,
    /// False when the presence already existed.
    pub created: bool,
}

async fn open_session_roster<S>(store: &S, session_id: u64) -> Result<(Session, Roster), CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let session = load_session(store, session_id).await?;
    if session.closed {
        return Err(CoreError::SessionClosed(session_id));
    }
    let roster = roster(store, session.course_id).await?;
    Ok((session, roster))
}

/// Records a presence for a roster student of an open session. Recording
/// twice is success; a student already marked absent is a conflict.
pub async fn record_presence<S>(
    store: &S,
    session_id: u64,
    student_id: u64,
) -> Result<PresenceRecorded, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let (_, roster) = open_session_roster(store, session_id).await?;
    if !roster.contains(student_id) {
        return Err(CoreError::Validation(format!(
            "Student {student_id} is not enrolled in course {}",
            roster.course.id
        )));
    }

    let created = match store.insert_attendance(session_id, student_id).await {
        Ok(attendance_id) => {
            info!(session_id, student_id, attendance_id, "Presence recorded");
            true
        }
        Err(StoreError::DuplicateAttendance { .. }) => {
            match settled(store, session_id, student_id).await? {
                StepOutcome::AlreadyAbsent => {
                    return Err(CoreError::AlreadyAbsent {
                        session_id,
                        student_id,
                    });
                }
                _ => {
                    debug!(session_id, student_id, "Presence already recorded");
                    false
                }
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(PresenceRecorded {
        session_id,
        student_id,
        created,
    })
}

/// Roster partition for a session.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSheet {
    pub session_id: u64,
    pub closed: bool,
    pub present: Vec<u64>,
    pub absent: Vec<u64>,
    /// Roster students with no determination yet (always empty after a clean closeout).
    pub undetermined: Vec<u64>,
}

pub async fn attendance_sheet<S>(store: &S, session_id: u64) -> Result<AttendanceSheet, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let session = load_session(store, session_id).await?;
    let roster = roster(store, session.course_id).await?;

    let present: Vec<u64> = store
        .attendances_for_session(session_id)
        .await?
        .into_iter()
        .map(|a| a.student_id)
        .collect();
    let absent: Vec<u64> = store
        .absences_for_session(session_id)
        .await?
        .into_iter()
        .map(|a| a.student_id)
        .collect();

    let undetermined = roster
        .students
        .iter()
        .map(|s| s.id)
        .filter(|id| !present.contains(id) && !absent.contains(id))
        .collect();

    Ok(AttendanceSheet {
        session_id,
        closed: session.closed,
        present,
        absent,
        undetermined,
    })
}
