//! # Tensions Testkit
//!
//! Testing utilities for Tensions.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for keys, entries and stored values
//! - **Fixtures**: A keypair plus memory backend with registry and claim helpers
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tensions_testkit::generators::{record_key, stored_value};
//!
//! proptest! {
//!     #[test]
//!     fn chunked_roundtrip(key in record_key(), value in stored_value(512)) {
//!         // write then read through a ChunkedStore
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use tensions_testkit::fixtures::{sample_tension, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let registry = fixture.registry();
//!     let id = registry.create(sample_tension("speed", "safety")).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{make_claim, sample_tension, small_chunks, wallets, TestFixture};
