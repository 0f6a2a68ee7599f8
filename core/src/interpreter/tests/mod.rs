//! Tests for the interpreter
//!
//! Organized by feature area

mod helpers;

mod timing_tests;
