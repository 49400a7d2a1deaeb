//! In-memory fakes and an engine harness for scenario tests.
//!
//! Nothing here talks to Postgres or a real game host.

mod assets;
pub mod fixtures;
mod harness;
mod memory_store;
mod ownership;
mod world;

pub use assets::FakeAssets;
pub use harness::{FakeContext, FakeEngine, Harness, TEST_MAP, TEST_REGION, TEST_SEARCH_RADIUS};
pub use memory_store::{MemorySnapshotStore, StoreOp};
pub use ownership::{stamp_owner, FakeOwnership};
pub use world::{FakeWorld, WorldCall};
