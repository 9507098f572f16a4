//! In-process store used by the unit tests. One mutex covers all tables so
//! every pair insert is an atomic check-and-write, like a unique index.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{AttendanceStore, StoreError, StoreResult};
use crate::model::{
    absence::{Absence, AbsenceReview, Justification, NewReview, pending_absence},
    attendance::{Attendance, Determination},
    course::Course,
    enrollment::EnrollmentStatus,
    session::Session,
    student::Student,
};

#[derive(Default)]
struct Tables {
    students: BTreeMap<u64, Student>,
    courses: BTreeMap<u64, Course>,
    sessions: BTreeMap<u64, Session>,
    /// (student_id, program_id, status)
    enrollments: Vec<(u64, u64, EnrollmentStatus)>,
    attendances: BTreeMap<u64, Attendance>,
    absences: BTreeMap<u64, Absence>,
    reviews: Vec<AbsenceReview>,
    next_id: u64,
}

impl Tables {
    fn absence_mut(&mut self, absence_id: u64) -> Option<&mut Absence> {
        self.absences.get_mut(&absence_id)
    }

    fn push_review(&mut self, review: NewReview) {
        let id = self.next_id();
        self.reviews.push(AbsenceReview {
            id,
            absence_id: review.absence_id,
            kind: review.kind,
            comment: review.comment,
            file_ref: review.file_ref,
            actor_id: review.actor_id,
            created_at: review.created_at,
        });
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn determination(&self, session_id: u64, student_id: u64) -> Option<Determination> {
        if self
            .attendances
            .values()
            .any(|a| a.session_id == session_id && a.student_id == student_id)
        {
            Some(Determination::Present)
        } else if self
            .absences
            .values()
            .any(|a| a.session_id == session_id && a.student_id == student_id)
        {
            Some(Determination::Absent)
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_inserts: Mutex<HashSet<u64>>,
    /// Students whose next `determination` read misses existing records.
    stale_reads: Mutex<HashSet<u64>>,
    /// Students whose pair inserts are refused as duplicates without writing.
    phantom_duplicates: Mutex<HashSet<u64>>,
    failing_trail: Mutex<bool>,
}

fn recorded_at() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_768_206_600, 0)
        .unwrap()
        .naive_utc()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_student(&self, student: Student) {
        self.tables().students.insert(student.id, student);
    }

    pub fn add_course(&self, id: u64, program_id: u64) {
        self.tables().courses.insert(
            id,
            Course {
                id,
                name: format!("Course {id}"),
                code: format!("C{id}"),
                program_id,
                instructor_id: Some(900),
            },
        );
    }

    pub fn add_session(&self, session: Session) {
        self.tables().sessions.insert(session.id, session);
    }

    pub fn enroll(&self, student_id: u64, program_id: u64, status: EnrollmentStatus) {
        self.tables()
            .enrollments
            .push((student_id, program_id, status));
    }

    /// Makes every subsequent pair insert for `student_id` fail.
    pub fn fail_inserts_for(&self, student_id: u64) {
        self.failing_inserts.lock().unwrap().insert(student_id);
    }

    pub fn heal(&self) {
        self.failing_inserts.lock().unwrap().clear();
        *self.failing_trail.lock().unwrap() = false;
    }

    /// The next determination read for `student_id` answers "none", as if a
    /// concurrent writer committed right after it.
    pub fn stale_determination_once(&self, student_id: u64) {
        self.stale_reads.lock().unwrap().insert(student_id);
    }

    /// Pair inserts for `student_id` report a duplicate but write nothing.
    pub fn refuse_as_duplicate(&self, student_id: u64) {
        self.phantom_duplicates.lock().unwrap().insert(student_id);
    }

    /// Evidence and decision writes fail as a whole, like a rolled back
    /// transaction whose trail insert failed.
    pub fn fail_trail_writes(&self) {
        *self.failing_trail.lock().unwrap() = true;
    }

    pub fn reviews(&self) -> Vec<AbsenceReview> {
        self.tables().reviews.clone()
    }

    pub fn seed_attendance(&self, session_id: u64, student_id: u64) -> u64 {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables.attendances.insert(
            id,
            Attendance {
                id,
                session_id,
                student_id,
                recorded_at: recorded_at(),
            },
        );
        id
    }

    pub fn seed_absence(&self, session_id: u64, student_id: u64) -> u64 {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables
            .absences
            .insert(id, pending_absence(id, session_id, student_id));
        id
    }

    pub fn attendance_count(&self, session_id: u64) -> usize {
        self.tables()
            .attendances
            .values()
            .filter(|a| a.session_id == session_id)
            .count()
    }

    pub fn absence_count(&self, session_id: u64) -> usize {
        self.tables()
            .absences
            .values()
            .filter(|a| a.session_id == session_id)
            .count()
    }

    pub fn determination_of(&self, session_id: u64, student_id: u64) -> Option<Determination> {
        self.tables().determination(session_id, student_id)
    }

    pub fn is_closed(&self, session_id: u64) -> bool {
        self.tables()
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.closed)
    }

    fn check_failure(&self, session_id: u64, student_id: u64) -> StoreResult<()> {
        if self.failing_inserts.lock().unwrap().contains(&student_id) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        if self.phantom_duplicates.lock().unwrap().contains(&student_id) {
            return Err(StoreError::DuplicateAttendance {
                session_id,
                student_id,
            });
        }
        Ok(())
    }

    fn check_trail(&self) -> StoreResult<()> {
        if *self.failing_trail.lock().unwrap() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn get_session(&self, session_id: u64) -> StoreResult<Option<Session>> {
        Ok(self.tables().sessions.get(&session_id).cloned())
    }

    async fn get_course(&self, course_id: u64) -> StoreResult<Option<Course>> {
        Ok(self.tables().courses.get(&course_id).cloned())
    }

    async fn get_student(&self, student_id: u64) -> StoreResult<Option<Student>> {
        Ok(self.tables().students.get(&student_id).cloned())
    }

    async fn approved_students(&self, program_id: u64) -> StoreResult<Vec<Student>> {
        let tables = self.tables();
        let approved: HashSet<u64> = tables
            .enrollments
            .iter()
            .filter(|(_, program, status)| {
                *program == program_id && *status == EnrollmentStatus::Approved
            })
            .map(|(student_id, _, _)| *student_id)
            .collect();

        Ok(tables
            .students
            .values()
            .filter(|s| s.active && approved.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn determination(
        &self,
        session_id: u64,
        student_id: u64,
    ) -> StoreResult<Option<Determination>> {
        if self.stale_reads.lock().unwrap().remove(&student_id) {
            return Ok(None);
        }
        Ok(self.tables().determination(session_id, student_id))
    }

    async fn attendances_for_session(&self, session_id: u64) -> StoreResult<Vec<Attendance>> {
        Ok(self
            .tables()
            .attendances
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_attendance(&self, session_id: u64, student_id: u64) -> StoreResult<u64> {
        self.check_failure(session_id, student_id)?;
        let mut tables = self.tables();
        if tables.determination(session_id, student_id).is_some() {
            return Err(StoreError::DuplicateAttendance {
                session_id,
                student_id,
            });
        }
        let id = tables.next_id();
        tables.attendances.insert(
            id,
            Attendance {
                id,
                session_id,
                student_id,
                recorded_at: recorded_at(),
            },
        );
        Ok(id)
    }

    async fn insert_absence(&self, session_id: u64, student_id: u64) -> StoreResult<u64> {
        self.check_failure(session_id, student_id)?;
        let mut tables = self.tables();
        if tables.determination(session_id, student_id).is_some() {
            return Err(StoreError::DuplicateAttendance {
                session_id,
                student_id,
            });
        }
        let id = tables.next_id();
        tables
            .absences
            .insert(id, pending_absence(id, session_id, student_id));
        Ok(id)
    }

    async fn mark_session_closed(&self, session_id: u64) -> StoreResult<bool> {
        match self.tables().sessions.get_mut(&session_id) {
            Some(session) => {
                session.closed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_absence(&self, absence_id: u64) -> StoreResult<Option<Absence>> {
        Ok(self.tables().absences.get(&absence_id).cloned())
    }

    async fn absences_for_session(&self, session_id: u64) -> StoreResult<Vec<Absence>> {
        Ok(self
            .tables()
            .absences
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn absences_by_state(&self, state: Justification) -> StoreResult<Vec<Absence>> {
        Ok(self
            .tables()
            .absences
            .values()
            .filter(|a| a.justification == state)
            .cloned()
            .collect())
    }

    async fn record_evidence(&self, file_ref: &str, submission: NewReview) -> StoreResult<bool> {
        self.check_trail()?;
        let mut tables = self.tables();
        let Some(absence) = tables.absence_mut(submission.absence_id) else {
            return Ok(false);
        };
        absence.evidence_url = Some(file_ref.to_string());
        absence.evidence_submitted_at = Some(submission.created_at);
        absence.justification = Justification::Pending;
        tables.push_review(submission);
        Ok(true)
    }

    async fn record_decision(&self, state: Justification, review: NewReview) -> StoreResult<bool> {
        self.check_trail()?;
        let mut tables = self.tables();
        let Some(absence) = tables.absence_mut(review.absence_id) else {
            return Ok(false);
        };
        absence.justification = state;
        absence.reviewer_comment = review.comment.clone();
        tables.push_review(review);
        Ok(true)
    }

    async fn reviews_for(&self, absence_id: u64) -> StoreResult<Vec<AbsenceReview>> {
        Ok(self
            .tables()
            .reviews
            .iter()
            .filter(|r| r.absence_id == absence_id)
            .cloned()
            .collect())
    }
}
