//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod fake_browser;

use std::time::Duration;

use harvest_core::navigator::CascadeTiming;

/// Cascade waits short enough for tests.
pub fn fast_timing() -> CascadeTiming {
    CascadeTiming {
        control_wait: Duration::from_millis(200),
        results_wait: Duration::from_millis(200),
        popup_wait: Duration::from_millis(50),
        settle_delay: Duration::from_millis(1),
    }
}
