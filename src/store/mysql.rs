use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use std::str::FromStr;

use super::{AttendanceStore, StoreError, StoreResult};
use crate::model::{
    absence::{Absence, AbsenceReview, AbsenceRow, Justification, NewReview, ReviewKind},
    attendance::{Attendance, Determination},
    course::Course,
    enrollment::EnrollmentStatus,
    role::Role,
    session::Session,
    student::Student,
};

const STUDENT_COLUMNS: &str =
    "u.id, u.first_name, u.last_name, u.email, u.phone, u.reference_image_url, u.active";

const ABSENCE_COLUMNS: &str = "id, session_id, student_id, justified, evidence_url, \
     evidence_submitted_at, reviewer_comment";

#[derive(FromRow)]
struct ReviewRow {
    id: u64,
    absence_id: u64,
    kind: String,
    comment: Option<String>,
    file_ref: Option<String>,
    actor_id: u64,
    created_at: NaiveDateTime,
}

impl TryFrom<ReviewRow> for AbsenceReview {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let kind = ReviewKind::from_str(&row.kind)
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
        Ok(AbsenceReview {
            id: row.id,
            absence_id: row.absence_id,
            kind,
            comment: row.comment,
            file_ref: row.file_ref,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}

/// MySQL-backed store. Uniqueness of (session_id, student_id) on both
/// `attendances` and `absences` is declared in `schema.sql`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Runs a guarded pair insert and maps "nothing inserted" and SQLSTATE
    /// 23000 to `DuplicateAttendance`.
    async fn guarded_insert(&self, sql: &str, session_id: u64, student_id: u64) -> StoreResult<u64> {
        let duplicate = || StoreError::DuplicateAttendance {
            session_id,
            student_id,
        };

        let result = sqlx::query(sql)
            .bind(session_id)
            .bind(student_id)
            .bind(session_id)
            .bind(student_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(duplicate()),
            Ok(done) => Ok(done.last_insert_id()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                Err(duplicate())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Row-locks the absence for the rest of the transaction. A dropped
/// transaction rolls back, so an early return leaves nothing behind.
async fn lock_absence(tx: &mut Transaction<'_, MySql>, absence_id: u64) -> StoreResult<bool> {
    let found = sqlx::query_scalar::<_, u64>("SELECT id FROM absences WHERE id = ? FOR UPDATE")
        .bind(absence_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

async fn insert_review(tx: &mut Transaction<'_, MySql>, review: &NewReview) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO absence_reviews
            (absence_id, kind, comment, file_ref, actor_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(review.absence_id)
    .bind(review.kind.to_string())
    .bind(review.comment.as_deref())
    .bind(review.file_ref.as_deref())
    .bind(review.actor_id)
    .bind(review.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_id())
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn get_session(&self, session_id: u64) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, course_id, session_date, starts_at, ends_at, room, closed
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_course(&self, course_id: u64) -> StoreResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, name, code, program_id, instructor_id FROM courses WHERE id = ?",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn get_student(&self, student_id: u64) -> StoreResult<Option<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM users u WHERE u.id = ? AND u.role_id = ?"
        );
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .bind(Role::Student as u8)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn approved_students(&self, program_id: u64) -> StoreResult<Vec<Student>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {STUDENT_COLUMNS}
            FROM users u
            JOIN enrollments e ON e.student_id = u.id
            WHERE e.program_id = ?
              AND e.status = ?
              AND u.role_id = ?
              AND u.active = TRUE
            ORDER BY u.id
            "#
        );
        let students = sqlx::query_as::<_, Student>(&sql)
            .bind(program_id)
            .bind(EnrollmentStatus::Approved.to_string())
            .bind(Role::Student as u8)
            .fetch_all(&self.pool)
            .await?;

        Ok(students)
    }

    async fn determination(
        &self,
        session_id: u64,
        student_id: u64,
    ) -> StoreResult<Option<Determination>> {
        let kind = sqlx::query_scalar::<_, String>(
            r#"
            SELECT 'present' FROM attendances WHERE session_id = ? AND student_id = ?
            UNION ALL
            SELECT 'absent' FROM absences WHERE session_id = ? AND student_id = ?
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(student_id)
        .bind(session_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(kind.map(|k| match k.as_str() {
            "present" => Determination::Present,
            _ => Determination::Absent,
        }))
    }

    async fn attendances_for_session(&self, session_id: u64) -> StoreResult<Vec<Attendance>> {
        let rows = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, session_id, student_id, recorded_at
            FROM attendances
            WHERE session_id = ?
            ORDER BY student_id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_attendance(&self, session_id: u64, student_id: u64) -> StoreResult<u64> {
        self.guarded_insert(
            r#"
            INSERT INTO attendances (session_id, student_id, recorded_at)
            SELECT ?, ?, NOW() FROM DUAL
            WHERE NOT EXISTS (
                SELECT 1 FROM absences WHERE session_id = ? AND student_id = ?
            )
            "#,
            session_id,
            student_id,
        )
        .await
    }

    async fn insert_absence(&self, session_id: u64, student_id: u64) -> StoreResult<u64> {
        self.guarded_insert(
            r#"
            INSERT INTO absences (session_id, student_id, justified)
            SELECT ?, ?, NULL FROM DUAL
            WHERE NOT EXISTS (
                SELECT 1 FROM attendances WHERE session_id = ? AND student_id = ?
            )
            "#,
            session_id,
            student_id,
        )
        .await
    }

    async fn mark_session_closed(&self, session_id: u64) -> StoreResult<bool> {
        // rows_affected is 0 for an already-closed row on MySQL, so existence
        // is checked separately.
        sqlx::query("UPDATE sessions SET closed = TRUE WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists > 0)
    }

    async fn get_absence(&self, absence_id: u64) -> StoreResult<Option<Absence>> {
        let sql = format!("SELECT {ABSENCE_COLUMNS} FROM absences WHERE id = ?");
        let row = sqlx::query_as::<_, AbsenceRow>(&sql)
            .bind(absence_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Absence::from))
    }

    async fn absences_for_session(&self, session_id: u64) -> StoreResult<Vec<Absence>> {
        let sql = format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE session_id = ? ORDER BY student_id"
        );
        let rows = sqlx::query_as::<_, AbsenceRow>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Absence::from).collect())
    }

    async fn absences_by_state(&self, state: Justification) -> StoreResult<Vec<Absence>> {
        // `justified = NULL` never matches, so pending needs IS NULL.
        let rows = match state.to_column() {
            None => {
                let sql = format!(
                    "SELECT {ABSENCE_COLUMNS} FROM absences WHERE justified IS NULL ORDER BY id"
                );
                sqlx::query_as::<_, AbsenceRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(flag) => {
                let sql = format!(
                    "SELECT {ABSENCE_COLUMNS} FROM absences WHERE justified = ? ORDER BY id"
                );
                sqlx::query_as::<_, AbsenceRow>(&sql)
                    .bind(flag)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Absence::from).collect())
    }

    async fn record_evidence(&self, file_ref: &str, submission: NewReview) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !lock_absence(&mut tx, submission.absence_id).await? {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE absences
            SET evidence_url = ?, evidence_submitted_at = ?, justified = NULL
            WHERE id = ?
            "#,
        )
        .bind(file_ref)
        .bind(submission.created_at)
        .bind(submission.absence_id)
        .execute(&mut *tx)
        .await?;

        insert_review(&mut tx, &submission).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn record_decision(&self, state: Justification, review: NewReview) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !lock_absence(&mut tx, review.absence_id).await? {
            return Ok(false);
        }

        sqlx::query("UPDATE absences SET justified = ?, reviewer_comment = ? WHERE id = ?")
            .bind(state.to_column())
            .bind(review.comment.as_deref())
            .bind(review.absence_id)
            .execute(&mut *tx)
            .await?;

        insert_review(&mut tx, &review).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn reviews_for(&self, absence_id: u64) -> StoreResult<Vec<AbsenceReview>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, absence_id, kind, comment, file_ref, actor_id, created_at
            FROM absence_reviews
            WHERE absence_id = ?
            ORDER BY id
            "#,
        )
        .bind(absence_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AbsenceReview::try_from).collect()
    }
}
