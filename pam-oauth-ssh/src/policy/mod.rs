//! Login policy gates applied to an introspected token.
//!
//! Token validity and session validity are independent checks; a login needs
//! both. Rejections are expected outcomes and are logged at info level.

pub mod session;
pub mod token;

pub use session::{check_session, SessionPolicy, SessionRejection};
pub use token::{check_token, TokenRejection, SSH_SCOPE_SUFFIX};
