//! Application layer orchestrating selector inference, sessions, and feed output.

pub mod builder;
pub mod dates;
pub mod extract;
pub mod feed;
pub mod inference;
pub mod preview;
pub mod relative;
pub mod session;
pub mod store;
