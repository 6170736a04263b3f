//! Common JWT utilities shared across the gatekeeper crates.

#![warn(clippy::pedantic)]

/// Module for JWT primitives (bearer extraction, parsing, temporal checks)
pub mod jwt;
