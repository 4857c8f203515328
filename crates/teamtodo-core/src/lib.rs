//! Team and todo services
//!
//! Callers pass an already authenticated user id; every operation checks it
//! against the rules in [`policy`] before touching the store.

pub mod error;
pub mod membership;
pub mod policy;
pub mod profile;
pub mod todo;
pub mod validation;

pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use membership::{MemberInfo, MembershipService, UserTeam};
pub use profile::{ProfileService, ProfileUpdate};
pub use teamtodo_db::functions::{JoinResult, JoinStatus};
pub use todo::{TodoList, TodoService, TodoStats};
