use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Reviewer decision on an absence.
///
/// Stored as a nullable boolean (`NULL` pending, `1` justified, `0` rejected);
/// the enum keeps "no decision yet" distinct from a negative decision.
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Justification {
    #[default]
    Pending,
    Justified,
    Rejected,
}

impl Justification {
    pub fn from_column(value: Option<bool>) -> Self {
        match value {
            None => Justification::Pending,
            Some(true) => Justification::Justified,
            Some(false) => Justification::Rejected,
        }
    }

    pub fn to_column(self) -> Option<bool> {
        match self {
            Justification::Pending => None,
            Justification::Justified => Some(true),
            Justification::Rejected => Some(false),
        }
    }
}

/// Raw `absences` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AbsenceRow {
    pub id: u64,
    pub session_id: u64,
    pub student_id: u64,
    pub justified: Option<bool>,
    pub evidence_url: Option<String>,
    pub evidence_submitted_at: Option<NaiveDateTime>,
    pub reviewer_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 11,
    "session_id": 7,
    "student_id": 42,
    "justification": "pending",
    "evidence_url": null,
    "evidence_submitted_at": null,
    "reviewer_comment": null
}))]
pub struct Absence {
    #[schema(example = 11)]
    pub id: u64,
    #[schema(example = 7)]
    pub session_id: u64,
    #[schema(example = 42)]
    pub student_id: u64,
    pub justification: Justification,
    #[schema(nullable = true)]
    pub evidence_url: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>, nullable = true)]
    pub evidence_submitted_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub reviewer_comment: Option<String>,
}

impl Absence {
    pub fn has_evidence(&self) -> bool {
        self.evidence_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

impl From<AbsenceRow> for Absence {
    fn from(row: AbsenceRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            student_id: row.student_id,
            justification: Justification::from_column(row.justified),
            evidence_url: row.evidence_url,
            evidence_submitted_at: row.evidence_submitted_at,
            reviewer_comment: row.reviewer_comment,
        }
    }
}

/// Kind of an entry in the append-only review trail.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewKind {
    Submitted,
    Justified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AbsenceReview {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 11)]
    pub absence_id: u64,
    pub kind: ReviewKind,
    #[schema(nullable = true)]
    pub comment: Option<String>,
    #[schema(nullable = true)]
    pub file_ref: Option<String>,
    #[schema(example = 5)]
    pub actor_id: u64,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

/// Trail entry before it is assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub absence_id: u64,
    pub kind: ReviewKind,
    pub comment: Option<String>,
    pub file_ref: Option<String>,
    pub actor_id: u64,
    pub created_at: NaiveDateTime,
}

/// Shape produced by closeout: pending, no evidence, no comment.
#[cfg(test)]
pub(crate) fn pending_absence(id: u64, session_id: u64, student_id: u64) -> Absence {
    Absence {
        id,
        session_id,
        student_id,
        justification: Justification::Pending,
        evidence_url: None,
        evidence_submitted_at: None,
        reviewer_comment: None,
    }
}
