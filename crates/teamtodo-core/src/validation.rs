//! Input validation, run before any store call

use crate::error::{ServiceError, ServiceResult};

pub const TEAM_NAME_MIN: usize = 2;
pub const TEAM_NAME_MAX: usize = 50;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const DISPLAY_NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 500;
pub const AVATAR_URL_MAX: usize = 2048;
pub const EMAIL_MAX: usize = 254;
pub const TASK_MAX: usize = 1000;

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Trim and check a team name. Returns the trimmed name.
pub fn validate_team_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    let len = name.chars().count();

    if !(TEAM_NAME_MIN..=TEAM_NAME_MAX).contains(&len) {
        return Err(ServiceError::InvalidInput(format!(
            "Team name must be between {} and {} characters",
            TEAM_NAME_MIN, TEAM_NAME_MAX
        )));
    }

    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || is_cjk(c) || c.is_whitespace() || c == '-' || c == '_'
    };
    if !name.chars().all(allowed) {
        return Err(ServiceError::InvalidInput(
            "Team name may only contain letters, digits, Chinese characters, spaces, hyphens and underscores"
                .to_string(),
        ));
    }

    Ok(name.to_string())
}

/// Trim, lower-case and check an email address.
pub fn validate_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    let invalid = || ServiceError::InvalidEmail(email.clone());

    if email.is_empty() || email.len() > EMAIL_MAX || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(email)
}

/// Check a username: `[A-Za-z0-9_]`, 3-20 characters.
pub fn validate_username(username: &str) -> ServiceResult<String> {
    let username = username.trim();
    let len = username.chars().count();

    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ServiceError::InvalidInput(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ServiceError::InvalidInput(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }

    Ok(username.to_string())
}

/// Trim a todo task; empty tasks are rejected.
pub fn validate_task(task: &str) -> ServiceResult<String> {
    let task = task.trim();

    if task.is_empty() {
        return Err(ServiceError::InvalidInput("Task cannot be empty".to_string()));
    }
    if task.chars().count() > TASK_MAX {
        return Err(ServiceError::InvalidInput(format!(
            "Task must be at most {} characters",
            TASK_MAX
        )));
    }

    Ok(task.to_string())
}

/// Map an optional free-text field to `None` when blank, enforcing `max` chars.
pub fn optional_text(value: Option<&str>, field: &str, max: usize) -> ServiceResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > max {
        return Err(ServiceError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }

    Ok(Some(value.to_string()))
}

/// Avatar URLs must be absolute http(s) links.
pub fn validate_avatar_url(url: Option<&str>) -> ServiceResult<Option<String>> {
    let url = optional_text(url, "Avatar URL", AVATAR_URL_MAX)?;

    if let Some(url) = &url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ServiceError::InvalidInput(
                "Avatar URL must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(url)
}

/// How an invite identifier is resolved to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Exact email lookup
    Email(String),
    /// Username, then display name
    Name(String),
}

/// Classify an invite identifier. Anything containing `@` is an email.
pub fn parse_identifier(identifier: &str) -> ServiceResult<Identifier> {
    let identifier = identifier.trim();

    if identifier.is_empty() {
        return Err(ServiceError::InvalidInput(
            "Enter an email, username or display name".to_string(),
        ));
    }

    if identifier.contains('@') {
        return validate_email(identifier).map(Identifier::Email);
    }

    Ok(Identifier::Name(identifier.to_string()))
}
