use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::users::User;

/// Request body for `POST /authentication/user`.
#[derive(Debug, Deserialize)]
pub struct RegisterUserPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserPayload {
    /// Trims and lowercases the email, trims the username.
    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<(), String> {
        let username_len = self.username.chars().count();
        if !(3..=100).contains(&username_len) {
            return Err("username must be between 3 and 100 characters".into());
        }
        if self.email.len() > 255 || !is_valid_email(&self.email) {
            return Err("invalid email".into());
        }
        let password_len = self.password.chars().count();
        if !(3..=72).contains(&password_len) {
            return Err("password must be between 3 and 72 characters".into());
        }
        Ok(())
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Response for a registration. The invitation token never leaves the server
/// except inside the activation email.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub user: User,
    pub invitation_sent: bool,
}

/// Request body for the follow/unfollow routes.
#[derive(Debug, Deserialize)]
pub struct FollowPayload {
    pub follower_id: i64,
}
