pub mod ids;
pub mod image;

pub use image::{ImageRecord, SampleKind};
pub use test::{TestKind, TestRecord};
