//! eff-core: Shared types and collaborator traits for the Effervescence driver
//!
//! This crate holds the identifiers and interfaces that the task queue and the
//! client-management code both need, without either depending on the other.
//!
//! # Collaborators
//!
//! ```text
//! ┌──────────────┐   swap_in_shadow_maps_rt   ┌──────────────┐
//! │  TaskQueue   │───────────────────────────▶│  ShadowMaps  │
//! │              │   start/stop_io_non_rt     ├──────────────┤
//! │ - RT lane    │───────────────────────────▶│   ClientIo   │
//! │ - non-RT lane│   properties_changed       ├──────────────┤
//! │              │───────────────────────────▶│ HostNotifier │
//! └──────────────┘                            └──────────────┘
//! ```

mod collaborators;
mod error;
mod ids;
mod property;

pub use collaborators::*;
pub use error::*;
pub use ids::*;
pub use property::*;
