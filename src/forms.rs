//! Submitted form bodies and the rules their fields must satisfy.

use serde::Deserialize;

use crate::auth::password::MAX_PASSWORD_BYTES;
use crate::error::{AppError, AppResult};

/// Length and presence constraint for one text field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub max_len: usize,
    pub required: bool,
}

pub const LOGIN: FieldRule = FieldRule {
    name: "login",
    max_len: 20,
    required: true,
};

pub const NAME: FieldRule = FieldRule {
    name: "name",
    max_len: 64,
    required: true,
};

pub const EMAIL: FieldRule = FieldRule {
    name: "email",
    max_len: 64,
    required: false,
};

pub const RESET_KEY: FieldRule = FieldRule {
    name: "reset",
    max_len: 64,
    required: true,
};

impl FieldRule {
    /// Trim `value` and check it against the rule.
    pub fn check<'a>(&self, value: &'a str) -> AppResult<&'a str> {
        let value = value.trim();
        if self.required && value.is_empty() {
            return Err(AppError::BadRequest(format!(
                "The {} field is required.",
                self.name
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(AppError::BadRequest(format!(
                "The {} field contains invalid characters.",
                self.name
            )));
        }
        if value.chars().count() > self.max_len {
            return Err(AppError::BadRequest(format!(
                "The {} field must be at most {} characters.",
                self.name, self.max_len
            )));
        }
        Ok(value)
    }

    pub fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }
}

/// An address goes into mail headers: it needs an `@` and may hold no
/// whitespace or control characters.
pub fn looks_like_email(value: &str) -> bool {
    value.contains('@') && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Registration form; also used as the query string that prefills it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub login: String,
    pub name: String,
    pub email: String,
}

/// Checked registration fields.
#[derive(Debug, PartialEq)]
pub struct Registration<'a> {
    pub login: &'a str,
    pub name: &'a str,
    pub email: &'a str,
}

impl RegistrationForm {
    /// All three fields are required at registration, including e-mail.
    pub fn validate(&self) -> AppResult<Registration<'_>> {
        Ok(Registration {
            login: LOGIN.check(&self.login)?,
            name: NAME.check(&self.name)?,
            email: EMAIL.required().check(&self.email)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetForm {
    pub reset: String,
}

impl ResetForm {
    pub fn key(&self) -> AppResult<&str> {
        RESET_KEY.check(&self.reset)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub oldpass: String,
    pub pass1: String,
    pub pass2: String,
}

impl PasswordForm {
    /// The new password, once both copies agree.
    pub fn new_password(&self) -> AppResult<&str> {
        if self.pass1.is_empty() {
            return Err(AppError::BadRequest(
                "You may not use an empty password !".into(),
            ));
        }
        if self.pass1 != self.pass2 {
            return Err(AppError::BadRequest(
                "Your confirmation password is not the same than your password !".into(),
            ));
        }
        if self.pass1.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::BadRequest(format!(
                "Passwords are limited to {} bytes.",
                MAX_PASSWORD_BYTES
            )));
        }
        Ok(&self.pass1)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    /// Only honoured when submitted by a user manager.
    pub groupid: Option<i64>,
}

/// Checked profile fields.
#[derive(Debug, PartialEq)]
pub struct Profile<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

impl ProfileForm {
    pub fn validate(&self) -> AppResult<Profile<'_>> {
        let name = NAME.check(&self.name)?;
        let email = EMAIL.check(&self.email)?;
        if !email.is_empty() && !looks_like_email(email) {
            return Err(AppError::BadRequest(
                "You must provide a valid e-mail address.".into(),
            ));
        }
        Ok(Profile { name, email })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
}
