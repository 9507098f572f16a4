use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Only `Approved` enrollments put a student on a course roster.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
}
