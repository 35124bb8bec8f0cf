// src/lib.rs

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod history;
pub mod pdf;
pub mod pipeline;
