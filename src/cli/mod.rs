pub mod args;
pub mod daemon;
pub mod detect;
pub mod health;
pub mod records;
