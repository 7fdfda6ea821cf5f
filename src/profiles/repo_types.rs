use sqlx::FromRow;
use time::Date;

/// One-to-one with `users` (keyed by user id), removed together with its user.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub gender: Option<String>,
    pub birthdate: Date,
    pub phone: Option<String>,
    pub email: String,
    pub image_key: Option<String>,
}

/// Editable profile columns.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub gender: Option<String>,
    pub birthdate: Date,
    pub phone: Option<String>,
    pub email: String,
}
