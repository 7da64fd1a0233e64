//! W3C WebDriver implementation of [`crate::session::Session`].

pub mod client;
pub mod error;
pub mod types;

pub use client::WebDriver;
pub use types::BrowserOptions;
