//! Endpoint handlers, one module per resource.

pub mod assets;
pub mod investments;
pub mod logs;
pub mod market;
pub mod summary;
pub mod users;
