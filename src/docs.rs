use crate::api::absences::{ReviewComment, SubmitEvidence};
use crate::api::attendance::RecordPresence;
use crate::justification::{AbsenceView, DecisionRequest};
use crate::model::absence::{Absence, AbsenceReview, Justification, ReviewKind};
use crate::model::session::SessionSummary;
use crate::model::student::StudentSummary;
use crate::reconcile::{AttendanceSheet, CloseoutSummary, PresenceRecorded, SkippedStudent};
use crate::recognition::IdentifyResponse;
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Classroom Attendance

Attendance tracking for a training program: students are identified from a
photo taken in class, everyone still unrecorded is marked absent when the
session is closed, and absences go through a justification review.

### Key Features
- **Recognition**
  - Identify the enrolled student in a probe photo (read-only; confirm with a presence)
- **Attendance**
  - Record presences, close a session, view the attendance sheet
- **Absences**
  - Submit or upload evidence, approve/reject justifications, review trail

### Security
All endpoints require a **JWT Bearer** access token.
Instructors run sessions; program leads and admins review justifications;
students may only see and justify their own absences.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::recognition::identify,

        crate::api::attendance::record_presence,
        crate::api::attendance::close_session,
        crate::api::attendance::attendance_sheet,

        crate::api::absences::get_absence,
        crate::api::absences::session_absences,
        crate::api::absences::list_absences,
        crate::api::absences::review_trail,
        crate::api::absences::submit_evidence,
        crate::api::absences::upload_evidence,
        crate::api::absences::decide,
        crate::api::absences::approve,
        crate::api::absences::reject
    ),
    components(
        schemas(
            IdentifyResponse,
            StudentSummary,
            SessionSummary,
            RecordPresence,
            PresenceRecorded,
            CloseoutSummary,
            SkippedStudent,
            AttendanceSheet,
            Absence,
            AbsenceView,
            AbsenceReview,
            Justification,
            ReviewKind,
            SubmitEvidence,
            DecisionRequest,
            ReviewComment
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Recognition", description = "Face identification during a session"),
        (name = "Attendance", description = "Presences, closeout and attendance sheets"),
        (name = "Absences", description = "Absence justification and review"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
