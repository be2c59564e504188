//! Infrastructure adapters for documents, configuration, and export delivery.

pub mod config;
pub mod html;
pub mod sink;
