//! Shared test helpers for dfd-client integration tests

#![allow(dead_code)]

pub mod fake_transport;
pub mod video_fixture;
