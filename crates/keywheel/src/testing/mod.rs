//! Testing utilities
//!
//! Mock implementations of the service seams so the pipelines can be
//! exercised without real infrastructure. Each mock records calls and can be
//! told to fail, which is how the failure-isolation and retry properties are
//! tested.

pub mod mocks;

pub use self::mocks::*;
