//! Data models for portal entities

mod case;
mod message;
mod user;

pub use case::*;
pub use message::*;
pub use user::*;
