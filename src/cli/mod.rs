//! Terminal front end: setup, user administration and portfolio summaries.

pub mod setup;
pub mod summary;
pub mod ui;
pub mod users;
