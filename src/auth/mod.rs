//! # Auth Facade
//!
//! Sign-up, sign-in, sign-out, user lookup, profile and password updates
//! and session refresh over a hosted auth backend modelled as
//! [`AuthProvider`].

pub mod crypto;
pub mod errors;
pub mod memory;
pub mod provider;
pub mod service;

pub use crypto::PasswordPolicy;
pub use errors::{AuthError, AuthResult};
pub use memory::MemoryAuthProvider;
pub use provider::{AuthProvider, AuthSession, AuthUser, UserUpdate};
pub use service::AuthService;
