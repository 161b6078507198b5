//! Core types and trait definitions for the Canteen check-in tracker.
//!
//! This crate holds the admission and billing logic and has no HTTP or
//! database dependencies. Storage backends implement the traits in
//! [`store`]; the HTTP layer and the server binary drive the services in
//! [`admission`] and [`aggregate`].

pub mod admission;
pub mod aggregate;
pub mod deduction;
pub mod error;
pub mod holder;
pub mod period;
pub mod resolver;
pub mod store;
pub mod visit;

pub use error::{Error, Result};
