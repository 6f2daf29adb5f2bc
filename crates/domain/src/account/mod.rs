//! Users, roles and explicit sessions.

mod loyalty;
mod service;
mod session;
mod user;
mod validation;

pub use loyalty::{accrue_loyalty, revoke_loyalty_if_covered};
pub use service::{AccountService, ProfileUpdate, Registration};
pub use session::Session;
pub use user::{AdminProfile, CustomerProfile, Role, RoleKind, User};
pub use validation::{normalize_email, validate_address, validate_password};

pub(crate) use user::{load_user, load_user_for_update};
