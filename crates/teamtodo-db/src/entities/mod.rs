//! Database entities

pub mod team;
pub mod team_member;
pub mod todo;
pub mod user;
pub mod user_profile;

pub use team::Entity as Team;
pub use team_member::Entity as TeamMember;
pub use todo::Entity as Todo;
pub use user::Entity as User;
pub use user_profile::Entity as UserProfile;

pub mod prelude {
    pub use super::team::Entity as Team;
    pub use super::team_member::Entity as TeamMember;
    pub use super::todo::Entity as Todo;
    pub use super::user::Entity as User;
    pub use super::user_profile::Entity as UserProfile;
}
