//! Host account database.

pub mod user;

pub use user::{AccountDatabase, SystemAccounts, UserError, UserInfo};
