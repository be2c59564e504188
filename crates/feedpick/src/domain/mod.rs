//! Domain types shared by the inference engine, the session, and adapters.

pub mod errors;
pub mod model;
pub mod tree;
