pub mod auth;
pub mod bookings;
#[cfg(debug_assertions)]
pub mod debug;
pub mod health;
pub mod impact;
pub mod maps;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod profiles;
pub mod rides;
pub mod vehicles;
