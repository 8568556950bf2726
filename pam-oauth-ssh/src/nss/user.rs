//! Local account resolution via NSS.
//!
//! Mapped accounts only count when the host knows them. The lookup sits
//! behind [`AccountDatabase`] so the resolver can run against a fixed set.

use thiserror::Error;
use uzers::{get_user_by_name, User};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Invalid username")]
    InvalidUsername,
}

/// Information about a resolved local account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub uid: u32,
}

impl UserInfo {
    fn from_user(user: &User, username: &str) -> Self {
        Self {
            username: username.to_string(),
            uid: user.uid(),
        }
    }
}

pub trait AccountDatabase {
    fn user_info(&self, username: &str) -> Result<UserInfo, UserError>;

    fn account_exists(&self, username: &str) -> bool {
        self.user_info(username).is_ok()
    }
}

/// The host's own accounts (passwd, SSSD, LDAP, whatever NSS is configured for).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

impl AccountDatabase for SystemAccounts {
    fn user_info(&self, username: &str) -> Result<UserInfo, UserError> {
        if username.is_empty() || username.contains('\0') {
            return Err(UserError::InvalidUsername);
        }

        match get_user_by_name(username) {
            Some(user) => Ok(UserInfo::from_user(&user, username)),
            None => Err(UserError::NotFound(username.to_string())),
        }
    }
}
