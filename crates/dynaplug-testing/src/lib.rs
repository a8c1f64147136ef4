//! Testing utilities for dynaplug
//!
//! This crate provides:
//! - The interface traits implemented by the fixture plugin libraries
//! - A helper that builds a fixture library on demand and returns its path

pub mod fixtures;
pub mod interfaces;

pub use fixtures::{fixture_library, try_fixture_library};
pub use interfaces::{DoubleBase, IntBase, NameBase, SetterBase, SomeInterface};
