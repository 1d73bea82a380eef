use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A field-level validation problem reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Raw registration input, checked by [`validate_registration`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

const MIN_EXCLUSIVE_LEN: usize = 2;

/// Returns the summary message and the offending field, if any.
pub fn validate_registration(registration: &Registration) -> Option<(String, FieldIssue)> {
    if !registration.email.contains('@') {
        return Some((
            "Invalid email".into(),
            FieldIssue::new("email", "Please enter a valid email"),
        ));
    }
    if registration.username.contains('@') {
        return Some((
            "Invalid username".into(),
            FieldIssue::new("username", "Username cannot include the @ symbol"),
        ));
    }
    if registration.username.chars().count() <= MIN_EXCLUSIVE_LEN {
        return Some((
            "Invalid username".into(),
            FieldIssue::new("username", "Username must be longer than 2 characters"),
        ));
    }
    if !password_long_enough(&registration.password) {
        return Some((
            "Invalid password".into(),
            FieldIssue::new("password", "Password must be longer than 2 characters"),
        ));
    }
    None
}

pub fn password_long_enough(password: &str) -> bool {
    password.chars().count() > MIN_EXCLUSIVE_LEN
}
