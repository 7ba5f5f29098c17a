//! eff-clients: Client bookkeeping for the Effervescence driver
//!
//! Tracks the host's clients and which of them are doing IO, and keeps a copy
//! of the client map the real-time side can read without waiting on the
//! non-real-time side.
//!
//! # Shadow maps
//!
//! ```text
//!              non-RT writer                      RT reader
//!   ┌─────────────────────────────┐       ┌───────────────────────┐
//!   │ 1. edit shadow map          │       │ with_live_map_rt()    │
//!   │ 2. swap (on the RT worker)  │──────▶│   reads maps[live]    │
//!   │ 3. replay edit on new shadow│       └───────────────────────┘
//!   └─────────────────────────────┘
//! ```

mod client;
mod host;
mod registry;

pub use client::{Client, ClientMap};
pub use host::{Notification, RecordingHost};
pub use registry::ClientRegistry;
