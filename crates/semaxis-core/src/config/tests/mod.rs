//! Configuration tests.

mod default_tests;
mod validation_tests;
