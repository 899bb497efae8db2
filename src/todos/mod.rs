//! # Todos Module
//!
//! Per-user todo list with role-based access:
//! - Users see and manage only their own todos
//! - Holders of the `admin` role see and manage all of them

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod validators;


pub use routes::todos_routes;
