//! Request shapes shared by patient and therapist profiles.

use serde::Deserialize;
use validator::Validate;

/// Profile fields supplied at sign-up.
///
/// `id` is the identifier issued by the sign-in provider and becomes the
/// document key.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(max = 100))]
    pub firstname: String,
    #[validate(length(max = 100))]
    pub lastname: String,
    #[validate(email)]
    pub email: String,
}

/// Mutable profile fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    #[serde(rename = "imageUrl")]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(rename = "expoPushToken")]
    #[validate(length(max = 256))]
    pub expo_push_token: Option<String>,
}
