//! # Hashlock Exchange Test Suite
//!
//! Cross-crate tests that drive the coordinator against the devnet ledgers
//! exactly as the node wires them.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── swap_benchmarks.rs   # Script derivation, timelocks, full swaps
//! │
//! └── src/integration/
//!     ├── scenarios.rs         # Initiate, execute, refund, script determinism
//!     ├── flows.rs             # Token and priced swaps, expiry, node runtime
//!     ├── concurrency.rs       # Racing execute, refund and sweep
//!     └── persistence.rs       # Resume after a store reopen (rocksdb)
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p swap-tests
//!
//! # By category
//! cargo test -p swap-tests integration::scenarios::
//! cargo test -p swap-tests integration::concurrency::
//!
//! # Durable store
//! cargo test -p swap-tests --features rocksdb integration::persistence::
//!
//! # Benchmarks
//! cargo bench -p swap-tests
//! ```

pub mod integration;
