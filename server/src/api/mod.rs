//! HTTP routes and handlers.

mod auth;
pub mod error;
pub mod events;
mod health;
pub mod models;
mod router;

pub use router::create_router;
