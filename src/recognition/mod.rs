pub mod extractor;
pub mod matcher;

pub use extractor::{HttpFeatureExtractor, ImageSource};
pub use matcher::{Candidate, Matcher, MatcherSettings};

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::model::{attendance::Determination, student::StudentSummary};
use matcher::MatchOutcome;
use crate::reconcile::load_session;
use crate::roster::roster;
use crate::store::AttendanceStore;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "matched": true,
    "student": {
        "id": 42,
        "first_name": "Amina",
        "last_name": "El Idrissi",
        "email": "amina@univ.example",
        "reference_image_url": "https://media.example/students/42.jpg"
    },
    "similarity": 62,
    "distance": 0.38,
    "already_present": false,
    "compared": 24,
    "skipped": 1
}))]
pub struct IdentifyResponse {
    pub matched: bool,
    #[schema(nullable = true)]
    pub student: Option<StudentSummary>,
    #[schema(nullable = true)]
    pub similarity: Option<i32>,
    #[schema(nullable = true)]
    pub distance: Option<f32>,
    /// A presence already exists for this student and session.
    pub already_present: bool,
    pub compared: usize,
    pub skipped: usize,
}

/// Identifies which roster student of `course_id` the probe depicts, for a
/// session of that course. Read-only: recording the presence is up to the caller.
pub async fn identify<S>(
    store: &S,
    matcher: &Matcher,
    probe: &ImageSource,
    course_id: u64,
    session_id: u64,
) -> Result<IdentifyResponse, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let session = load_session(store, session_id).await?;
    if session.course_id != course_id {
        return Err(CoreError::Validation(format!(
            "Session {session_id} does not belong to course {course_id}"
        )));
    }

    let roster = roster(store, course_id).await?;
    let candidates = roster.candidates();
    if candidates.is_empty() {
        info!(course_id, "No student with a reference photo for this course");
    }

    let identification = matcher.identify(probe, &candidates).await?;
    let skipped = identification.skipped.len();

    let found = match identification.outcome {
        MatchOutcome::Matched(found) => found,
        MatchOutcome::NoMatch => {
            return Ok(IdentifyResponse {
                matched: false,
                student: None,
                similarity: None,
                distance: None,
                already_present: false,
                compared: identification.compared,
                skipped,
            });
        }
    };

    let student = roster
        .student(found.student_id)
        .ok_or(CoreError::StudentNotFound(found.student_id))?;
    let already_present = matches!(
        store.determination(session_id, found.student_id).await?,
        Some(Determination::Present)
    );

    info!(
        session_id,
        student_id = student.id,
        name = %student.full_name(),
        distance = found.distance,
        threshold = matcher.threshold(),
        already_present,
        "Student identified"
    );

    Ok(IdentifyResponse {
        matched: true,
        student: Some(StudentSummary::from(student)),
        similarity: Some(found.similarity),
        distance: Some(found.distance),
        already_present,
        compared: identification.compared,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::matcher::tests::{Scripted, ScriptedExtractor};
    use super::*;
    use crate::model::enrollment::EnrollmentStatus;
    use crate::model::session::session;
    use crate::model::student::student;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn setup() -> (MemoryStore, Matcher) {
        let store = MemoryStore::new();
        store.add_course(3, 30);
        store.add_course(4, 30);
        store.add_session(session(7, 3));
        store.add_student(student(1, Some("ref/1")));
        store.add_student(student(2, Some("ref/2")));
        store.add_student(student(3, None));
        for id in 1..=3 {
            store.enroll(id, 30, EnrollmentStatus::Approved);
        }

        let extractor = ScriptedExtractor::default()
            .with("probe", Scripted::Vector(vec![0.0, 0.0]))
            .with("stranger", Scripted::Vector(vec![5.0, 5.0]))
            .with("ref/1", Scripted::Vector(vec![0.5, 0.0]))
            .with("ref/2", Scripted::Vector(vec![0.2, 0.0]));
        let matcher = Matcher::new(Arc::new(extractor), MatcherSettings::default());
        (store, matcher)
    }

    #[tokio::test]
    async fn matches_and_reports_existing_presence() {
        let (store, matcher) = setup();
        let probe = ImageSource::Bytes(b"probe".to_vec());

        let first = identify(&store, &matcher, &probe, 3, 7).await.unwrap();
        assert!(first.matched);
        assert_eq!(first.student.as_ref().map(|s| s.id), Some(2));
        assert_eq!(first.similarity, Some(80));
        assert!(!first.already_present);
        assert_eq!(first.compared, 2);

        store.seed_attendance(7, 2);
        let second = identify(&store, &matcher, &probe, 3, 7).await.unwrap();
        assert!(second.already_present);
        // read-only: nothing was recorded by identification itself
        assert_eq!(store.attendance_count(7), 1);
    }

    #[tokio::test]
    async fn unknown_face_is_no_match() {
        let (store, matcher) = setup();
        let probe = ImageSource::Bytes(b"stranger".to_vec());
        let result = identify(&store, &matcher, &probe, 3, 7).await.unwrap();
        assert!(!result.matched);
        assert!(result.student.is_none());
    }

    #[tokio::test]
    async fn session_must_belong_to_course() {
        let (store, matcher) = setup();
        let probe = ImageSource::Bytes(b"probe".to_vec());
        assert!(matches!(
            identify(&store, &matcher, &probe, 4, 7).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            identify(&store, &matcher, &probe, 3, 70).await,
            Err(CoreError::SessionNotFound(70))
        ));
    }
}
