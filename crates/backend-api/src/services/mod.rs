pub mod auth;
pub mod booking;
pub mod error;
pub mod impact;
pub mod message;
pub mod notification;
pub mod profile;
pub mod ride;
pub mod search;
pub mod vehicle;

pub use error::*;
