//! Event types broadcast from the core to whatever hosts it.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them verbatim over its own event bus.

pub mod events;
