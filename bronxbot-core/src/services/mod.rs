// File: src/services/mod.rs

pub mod owner;

pub use owner::OwnerService;
