//! Identity provider: session tokens and password hashing
//!
//! The membership and todo services never see credentials. They only
//! consume the user id carried by a validated [`SessionClaims`].

pub mod jwt;
pub mod password;

pub use jwt::{JwtError, JwtValidator, SessionClaims, SESSION_TOKEN_TYPE};
pub use password::{
    check_password_policy, hash_password, verify_password, PasswordError, MIN_PASSWORD_LEN,
};
