//! API layer: REST routing, handlers, and the structured error shape

pub mod error;
pub mod handlers;
mod rest;

pub use rest::{router, webhook_router};
