//! Test utilities for use case and HTTP tests.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - `TestAppStateBuilder` for exercising routers without Postgres or Redis

mod app_state_builder;
mod auth_mocks;
mod billing_mocks;
mod factories;

pub use app_state_builder::*;
pub use auth_mocks::*;
pub use billing_mocks::*;
pub use factories::*;
