//! Roster resolution for a course: active students with an approved
//! enrollment in the course's programme.

use crate::error::CoreError;
use crate::model::{course::Course, student::Student};
use crate::recognition::{Candidate, ImageSource};
use crate::store::AttendanceStore;

#[derive(Debug, Clone)]
pub struct Roster {
    pub course: Course,
    pub students: Vec<Student>,
}

impl Roster {
    /// Students that can be identified from a photo. Those without a usable
    /// reference image stay on the roster but can only be marked by hand.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.students
            .iter()
            .filter_map(|s| {
                s.reference_image().map(|url| Candidate {
                    student_id: s.id,
                    reference: ImageSource::Url(url.to_string()),
                })
            })
            .collect()
    }

    pub fn contains(&self, student_id: u64) -> bool {
        self.students.iter().any(|s| s.id == student_id)
    }

    pub fn student(&self, student_id: u64) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

pub async fn roster<S>(store: &S, course_id: u64) -> Result<Roster, CoreError>
where
    S: AttendanceStore + ?Sized,
{
    let course = store
        .get_course(course_id)
        .await?
        .ok_or(CoreError::CourseNotFound(course_id))?;

    let students = store
        .approved_students(course.program_id)
        .await?
        .into_iter()
        .filter(|s| s.active)
        .collect();

    Ok(Roster { course, students })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::enrollment::EnrollmentStatus;
    use crate::model::student::student;
    use crate::store::memory::MemoryStore;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_course(3, 30);
        store.add_course(4, 40);
        store.add_student(student(1, Some("https://media.example/1.jpg")));
        store.add_student(student(2, None));
        store.add_student(student(3, Some("https://media.example/3.jpg")));
        let mut inactive = student(4, Some("https://media.example/4.jpg"));
        inactive.active = false;
        store.add_student(inactive);
        store.add_student(student(5, Some("https://media.example/5.jpg")));

        store.enroll(1, 30, EnrollmentStatus::Approved);
        store.enroll(2, 30, EnrollmentStatus::Approved);
        store.enroll(3, 30, EnrollmentStatus::Pending);
        store.enroll(4, 30, EnrollmentStatus::Approved);
        store.enroll(5, 40, EnrollmentStatus::Approved);
        store
    }

    #[tokio::test]
    async fn only_active_approved_students_of_the_programme() {
        let store = seeded();
        let roster = roster(&store, 3).await.unwrap();
        let ids: Vec<u64> = roster.students.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn candidates_exclude_students_without_reference() {
        let store = seeded();
        let roster = roster(&store, 3).await.unwrap();
        let candidates = roster.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].student_id, 1);
        assert!(roster.contains(2));
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let store = seeded();
        let err = roster(&store, 99).await.unwrap_err();
        assert!(matches!(err, CoreError::CourseNotFound(99)));
    }
}
