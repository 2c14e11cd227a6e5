//! Utilities shared by Kiln tests.
//!
//! Tests never run a real compiler. Instead they assemble minimal class files
//! with [`ClassFixture`] and drop them into fake output directories.

mod class_fixture;

pub use class_fixture::{ClassFixture, MethodFixture};
