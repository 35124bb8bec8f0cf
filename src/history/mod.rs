// src/history/mod.rs

//! Persistent run state: what the listing page looked like, which PDFs were
//! seen with which hash, and the extracted tariff catalog.

pub mod state;
pub mod store;

pub use state::{DocumentHashes, PageMeta};
pub use store::{JsonStore, MemoryStore, Store};

/// Document names used with [`Store`].
pub const PAGE_META: &str = "page_meta";
pub const PDF_LINKS: &str = "pdf_links";
pub const PDF_HASHES: &str = "pdf_hashes";
pub const TARIFFS: &str = "tariffs";
