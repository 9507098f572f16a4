use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "first_name": "Amina",
        "last_name": "El Idrissi",
        "email": "amina@univ.example",
        "phone": null,
        "reference_image_url": "https://media.example/students/42.jpg",
        "active": true
    })
)]
pub struct Student {
    #[schema(example = 42)]
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[schema(nullable = true)]
    pub phone: Option<String>,

    /// Latest reference photo. Replaced in place, never versioned.
    #[schema(nullable = true)]
    pub reference_image_url: Option<String>,

    pub active: bool,
}

impl Student {
    /// A usable reference is a non-blank URL.
    pub fn reference_image(&self) -> Option<&str> {
        self.reference_image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Identity projection embedded in read models.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StudentSummary {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = "Amina")]
    pub first_name: String,
    #[schema(example = "El Idrissi")]
    pub last_name: String,
    #[schema(example = "amina@univ.example")]
    pub email: String,
    #[schema(nullable = true)]
    pub reference_image_url: Option<String>,
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            first_name: s.first_name.clone(),
            last_name: s.last_name.clone(),
            email: s.email.clone(),
            reference_image_url: s.reference_image_url.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn student(id: u64, reference: Option<&str>) -> Student {
    Student {
        id,
        first_name: format!("First{id}"),
        last_name: format!("Last{id}"),
        email: format!("s{id}@univ.example"),
        phone: None,
        reference_image_url: reference.map(str::to_string),
        active: true,
    }
}
