//! Collaborators of the claims API: the domain model, persistence and
//! token handling. HTTP routing lives outside this crate; handlers are
//! expected to call these through [`RequestLifecycleLogger`].
//!
//! [`RequestLifecycleLogger`]: crate::lifecycle::RequestLifecycleLogger

pub mod auth;
pub mod model;
pub mod store;
