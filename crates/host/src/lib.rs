//! Host boundary: the entity, camera and screen primitives the overlay reads.
//!
//! # Invariants
//! - The overlay never mutates host state through these contracts.
//! - Every entity read is fallible; a vanished entity yields `None`/`false`.
//!
//! The `sim` module provides a seeded, deterministic host used by tests and
//! the CLI driver.

mod contract;
pub mod sim;

pub use contract::{CameraSource, EntitySource, Host, HostError, HostEvent};
pub use sim::{SimCamera, SimEntity, SimHost, SimWorld};

pub fn crate_info() -> &'static str {
    "waymark-host v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("host"));
    }
}
