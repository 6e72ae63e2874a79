pub mod document;
pub mod images;

pub use document::{Collection, DocumentStore};
