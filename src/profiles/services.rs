use crate::auth::services::is_valid_email;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_PHONE_LEN: usize = 20;

/// Checks shared by registration and profile edits. Expects trimmed input.
pub(crate) fn validate_profile_fields(username: &str, email: &str, phone: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push("Username is required".into());
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.push(format!("Username longer than {} characters", MAX_USERNAME_LEN));
    }
    if !is_valid_email(email) {
        errors.push("Invalid email".into());
    }
    if phone.is_some_and(|p| p.chars().count() > MAX_PHONE_LEN) {
        errors.push(format!("Phone longer than {} characters", MAX_PHONE_LEN));
    }
    errors
}
