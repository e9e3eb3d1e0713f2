// src/lib.rs

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod paginate;
