//! External service clients.

pub mod redis_services;
