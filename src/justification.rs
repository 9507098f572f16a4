//! Absence justification lifecycle.
//!
//! `Pending` is the only state closeout produces; `Justified` and `Rejected`
//! are reached only through a reviewer decision. Submitting evidence (again)
//! puts the absence back to `Pending` with a fresh timestamp. Every
//! submission and decision appends to the review trail.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::media::ObjectStore;
use crate::model::{
    absence::{Absence, AbsenceReview, Justification, NewReview, ReviewKind},
    session::SessionSummary,
    student::StudentSummary,
};
use crate::reconcile::load_session;
use crate::store::AttendanceStore;

/// Read model: an absence with its student and session, assembled on read.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AbsenceView {
    pub absence: Absence,
    pub student: StudentSummary,
    pub session: SessionSummary,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn non_blank(comment: Option<&str>) -> Option<&str> {
    comment.map(str::trim).filter(|c| !c.is_empty())
}

pub async fn load_absence<S>(store: &S, absence_id: u64) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    store
        .get_absence(absence_id)
        .await?
        .ok_or(CoreError::AbsenceNotFound(absence_id))
}

/// Loads an absence for a caller. When the caller is a student
/// (`student_scope`), someone else's absence answers like a missing one.
pub async fn load_visible_absence<S>(
    store: &S,
    absence_id: u64,
    student_scope: Option<u64>,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let absence = load_absence(store, absence_id).await?;
    match student_scope {
        Some(student_id) if student_id != absence.student_id => {
            Err(CoreError::AbsenceNotFound(absence_id))
        }
        _ => Ok(absence),
    }
}

pub async fn absence_view<S>(store: &S, absence: Absence) -> Result<AbsenceView, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let student = store
        .get_student(absence.student_id)
        .await?
        .ok_or(CoreError::StudentNotFound(absence.student_id))?;
    let session = load_session(store, absence.session_id).await?;

    Ok(AbsenceView {
        student: StudentSummary::from(&student),
        session: SessionSummary::from(&session),
        absence,
    })
}

pub async fn absence_views<S>(store: &S, absences: Vec<Absence>) -> Result<Vec<AbsenceView>, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let mut views = Vec::with_capacity(absences.len());
    for absence in absences {
        views.push(absence_view(store, absence).await?);
    }
    Ok(views)
}

/// Attaches (or replaces) the evidence file and reopens review.
pub async fn submit_evidence<S>(
    store: &S,
    absence_id: u64,
    file_ref: &str,
    actor_id: u64,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let file_ref = file_ref.trim();
    if file_ref.is_empty() {
        return Err(CoreError::Validation("file_ref is required".into()));
    }

    let previous = load_absence(store, absence_id).await?;
    let submission = NewReview {
        absence_id,
        kind: ReviewKind::Submitted,
        comment: None,
        file_ref: Some(file_ref.to_string()),
        actor_id,
        created_at: now(),
    };

    if !store.record_evidence(file_ref, submission).await? {
        return Err(CoreError::AbsenceNotFound(absence_id));
    }

    info!(
        absence_id,
        actor_id,
        previous_state = %previous.justification,
        "Evidence submitted"
    );

    load_absence(store, absence_id).await
}

/// Uploads an evidence file and attaches it. The uploaded object is deleted
/// again if it cannot be attached.
pub async fn upload_evidence<S, O>(
    store: &S,
    objects: &O,
    absence_id: u64,
    content_type: &str,
    bytes: Vec<u8>,
    actor_id: u64,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
    O: ObjectStore + ?Sized,
{
    if bytes.is_empty() {
        return Err(CoreError::Validation("No file provided".into()));
    }
    load_absence(store, absence_id).await?;

    let stored = objects.put("justifications", content_type, bytes).await?;

    match submit_evidence(store, absence_id, &stored.url, actor_id).await {
        Ok(absence) => Ok(absence),
        Err(e) => {
            // Only an object the row does not point at may go.
            match store.get_absence(absence_id).await {
                Ok(Some(row)) if row.evidence_url.as_deref() == Some(stored.url.as_str()) => {
                    warn!(absence_id, url = %stored.url, "Upload attached despite error, kept");
                }
                Ok(_) => {
                    if let Err(cleanup) = objects.delete(&stored.key).await {
                        warn!(absence_id, key = %stored.key, error = %cleanup, "Orphaned evidence upload");
                    }
                }
                Err(lookup) => {
                    warn!(absence_id, key = %stored.key, error = %lookup, "Upload state unknown, kept");
                }
            }
            Err(e)
        }
    }
}

/// Records a reviewer decision.
///
/// Approval needs submitted evidence or a non-blank comment explaining the
/// waiver. The rejection comment is validated at the HTTP boundary.
pub async fn decide<S>(
    store: &S,
    absence_id: u64,
    approve: bool,
    comment: Option<&str>,
    reviewer_id: u64,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let absence = load_absence(store, absence_id).await?;
    let comment = non_blank(comment);

    if approve && !absence.has_evidence() && comment.is_none() {
        return Err(CoreError::NotEligible(absence_id));
    }

    let (state, kind) = if approve {
        (Justification::Justified, ReviewKind::Justified)
    } else {
        (Justification::Rejected, ReviewKind::Rejected)
    };

    let review = NewReview {
        absence_id,
        kind,
        comment: comment.map(str::to_string),
        file_ref: absence.evidence_url.clone(),
        actor_id: reviewer_id,
        created_at: now(),
    };

    if !store.record_decision(state, review).await? {
        return Err(CoreError::AbsenceNotFound(absence_id));
    }

    info!(
        absence_id,
        reviewer_id,
        from = %absence.justification,
        to = %state,
        "Absence reviewed"
    );

    load_absence(store, absence_id).await
}

pub async fn approve<S>(
    store: &S,
    absence_id: u64,
    comment: Option<&str>,
    reviewer_id: u64,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    decide(store, absence_id, true, comment, reviewer_id).await
}

pub async fn reject<S>(
    store: &S,
    absence_id: u64,
    comment: &str,
    reviewer_id: u64,
) -> Result<Absence, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    decide(store, absence_id, false, Some(comment), reviewer_id).await
}

pub async fn review_trail<S>(store: &S, absence_id: u64) -> Result<Vec<AbsenceReview>, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    load_absence(store, absence_id).await?;
    Ok(store.reviews_for(absence_id).await?)
}

/// Body of a decision request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DecisionRequest {
    #[schema(example = false)]
    pub approve: bool,
    #[schema(example = "no proof", nullable = true)]
    pub comment: Option<String>,
}

impl DecisionRequest {
    /// A rejection must carry a non-blank comment.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.approve && non_blank(self.comment.as_deref()).is_none() {
            return Err(CoreError::Validation(
                "A comment is required to reject a justification".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::session::session;
    use crate::model::student::student;
    use crate::media::{ObjectStoreError, StoredObject};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const REVIEWER: u64 = 500;

    fn with_absence() -> (MemoryStore, u64) {
        let store = MemoryStore::new();
        store.add_course(3, 30);
        store.add_session(session(7, 3));
        store.add_student(student(42, None));
        let id = store.seed_absence(7, 42);
        (store, id)
    }

    #[tokio::test]
    async fn rejection_needs_a_comment_at_the_boundary() {
        let (store, id) = with_absence();

        let empty = DecisionRequest {
            approve: false,
            comment: Some("  ".into()),
        };
        assert!(matches!(empty.validate(), Err(CoreError::Validation(_))));
        let missing = DecisionRequest {
            approve: false,
            comment: None,
        };
        assert!(missing.validate().is_err());

        let ok = DecisionRequest {
            approve: false,
            comment: Some("no proof".into()),
        };
        ok.validate().unwrap();
        let absence = decide(&store, id, ok.approve, ok.comment.as_deref(), REVIEWER)
            .await
            .unwrap();
        assert_eq!(absence.justification, Justification::Rejected);
        assert_eq!(absence.reviewer_comment.as_deref(), Some("no proof"));
    }

    #[tokio::test]
    async fn evidence_then_approval() {
        let (store, id) = with_absence();

        let submitted = submit_evidence(&store, id, "https://media.example/cert.pdf", 42)
            .await
            .unwrap();
        assert_eq!(submitted.justification, Justification::Pending);
        assert!(submitted.evidence_submitted_at.is_some());

        let approved = approve(&store, id, None, REVIEWER).await.unwrap();
        assert_eq!(approved.justification, Justification::Justified);
        assert_eq!(approved.evidence_url.as_deref(), Some("https://media.example/cert.pdf"));
    }

    #[tokio::test]
    async fn approval_without_evidence_needs_a_waiver_comment() {
        let (store, id) = with_absence();

        let err = approve(&store, id, None, REVIEWER).await.unwrap_err();
        assert!(matches!(err, CoreError::NotEligible(_)));
        assert_eq!(
            load_absence(&store, id).await.unwrap().justification,
            Justification::Pending
        );

        let waived = approve(&store, id, Some("medical visit confirmed by phone"), REVIEWER)
            .await
            .unwrap();
        assert_eq!(waived.justification, Justification::Justified);
    }

    #[tokio::test]
    async fn resubmission_after_rejection_reopens_review() {
        let (store, id) = with_absence();
        submit_evidence(&store, id, "https://media.example/blurry.jpg", 42)
            .await
            .unwrap();
        reject(&store, id, "illegible", REVIEWER).await.unwrap();

        let again = submit_evidence(&store, id, "https://media.example/clear.jpg", 42)
            .await
            .unwrap();
        assert_eq!(again.justification, Justification::Pending);
        assert_eq!(again.evidence_url.as_deref(), Some("https://media.example/clear.jpg"));

        let trail = review_trail(&store, id).await.unwrap();
        let kinds: Vec<ReviewKind> = trail.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![ReviewKind::Submitted, ReviewKind::Rejected, ReviewKind::Submitted]
        );
        assert_eq!(trail[1].comment.as_deref(), Some("illegible"));
    }

    #[derive(Default)]
    struct RecordingObjects {
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingObjects {
        async fn put(
            &self,
            folder: &str,
            _content_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<StoredObject, ObjectStoreError> {
            Ok(StoredObject {
                url: format!("https://media.example/{folder}/1.pdf"),
                key: format!("{folder}/1"),
            })
        }

        async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn upload_attaches_stored_url() {
        let (store, id) = with_absence();
        let objects = RecordingObjects::default();
        let absence = upload_evidence(&store, &objects, id, "application/pdf", b"%PDF".to_vec(), 42)
            .await
            .unwrap();
        assert_eq!(
            absence.evidence_url.as_deref(),
            Some("https://media.example/justifications/1.pdf")
        );
        assert!(objects.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_trail_write_rolls_back_upload() {
        let (store, id) = with_absence();
        store.fail_trail_writes();
        let objects = RecordingObjects::default();

        let err = upload_evidence(&store, &objects, id, "application/pdf", b"%PDF".to_vec(), 42)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));

        let row = load_absence(&store, id).await.unwrap();
        assert_eq!(row.evidence_url, None);
        assert_eq!(row.evidence_submitted_at, None);
        assert_eq!(*objects.deleted.lock().unwrap(), vec!["justifications/1".to_string()]);
        assert!(store.reviews().is_empty());
    }

    #[tokio::test]
    async fn failed_trail_write_leaves_decision_unrecorded() {
        let (store, id) = with_absence();
        submit_evidence(&store, id, "https://media.example/cert.pdf", 42)
            .await
            .unwrap();
        store.fail_trail_writes();

        assert!(approve(&store, id, None, REVIEWER).await.is_err());
        let row = load_absence(&store, id).await.unwrap();
        assert_eq!(row.justification, Justification::Pending);
        assert_eq!(review_trail(&store, id).await.unwrap().len(), 1);

        store.heal();
        approve(&store, id, None, REVIEWER).await.unwrap();
        let kinds: Vec<ReviewKind> = store.reviews().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ReviewKind::Submitted, ReviewKind::Justified]);
    }

    #[tokio::test]
    async fn other_students_absence_looks_missing() {
        let (store, id) = with_absence();

        assert_eq!(load_visible_absence(&store, id, Some(42)).await.unwrap().id, id);
        assert_eq!(load_visible_absence(&store, id, None).await.unwrap().id, id);
        assert!(matches!(
            load_visible_absence(&store, id, Some(43)).await,
            Err(CoreError::AbsenceNotFound(i)) if i == id
        ));
        assert!(matches!(
            load_visible_absence(&store, 999, Some(43)).await,
            Err(CoreError::AbsenceNotFound(999))
        ));
    }

    #[tokio::test]
    async fn upload_for_missing_absence_stores_nothing() {
        let (store, _) = with_absence();
        let objects = RecordingObjects::default();
        let err = upload_evidence(&store, &objects, 999, "application/pdf", b"%PDF".to_vec(), 42)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AbsenceNotFound(999)));
    }

    #[tokio::test]
    async fn unknown_absence_is_not_found() {
        let (store, _) = with_absence();
        assert!(matches!(
            approve(&store, 999, Some("ok"), REVIEWER).await,
            Err(CoreError::AbsenceNotFound(999))
        ));
        assert!(matches!(
            submit_evidence(&store, 999, "https://media.example/x.pdf", 42).await,
            Err(CoreError::AbsenceNotFound(999))
        ));
    }

    #[tokio::test]
    async fn blank_file_ref_is_rejected() {
        let (store, id) = with_absence();
        let err = submit_evidence(&store, id, " ", 42).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn view_joins_student_and_session_without_touching_the_row() {
        let (store, id) = with_absence();
        let absence = load_absence(&store, id).await.unwrap();
        let view = absence_view(&store, absence.clone()).await.unwrap();
        assert_eq!(view.absence, absence);
        assert_eq!(view.student.id, 42);
        assert_eq!(view.session.id, 7);
        assert_eq!(view.session.room.as_deref(), Some("B12"));
    }
}
