//! Handler-side abstractions: what a message handler sees and what it may
//! answer with.

pub mod port;
pub mod types;
