//! Integration tests
//!
//! End-to-end tests of `ChatSession` over the in-memory transport, and of the
//! REST client against a mock HTTP server

mod reconnect_test;
mod rest_test;
