// src/lib.rs

pub mod db;
pub mod http;
pub mod eventbus;
pub mod repositories;
pub mod stats;
pub mod tasks;
pub mod services;

pub use db::Database;
pub use bronxbot_common::error::Error;
pub use http::{DefaultHttpClient, HttpClient, HttpResponse};
