//! Test suite for ticketchat
//!
//! This module organizes all tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod common;
pub mod integration;
pub mod property;
