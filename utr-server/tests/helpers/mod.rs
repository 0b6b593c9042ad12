//! Test helpers for utr-server integration tests
//!
//! - TestServer: router over a throwaway root folder and database
//! - FakeProvider / FakeImageGenerator: in-process upstream doubles

pub mod fakes;
pub mod test_server;

pub use fakes::{FakeImageGenerator, FakeProvider};
pub use test_server::{TestResponse, TestServer};
