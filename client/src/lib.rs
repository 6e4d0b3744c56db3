//! Client for the story, image and audio generation endpoints.

pub mod client;
pub mod error;

pub use client::*;
pub use error::*;
