//! Vitre Core - Change-event protocol and error types for vitre derived views.
//!
//! This crate provides the shared vocabulary every vitre stage speaks:
//!
//! - `ListEvent<T>`: a mutation notification (Add, Remove, Replace, Move, Reset)
//!   carrying the affected items and, when known, their positions
//! - `EventKind`: the discriminant, for dispatch tables and assertions
//! - `Error`: contract-violation and misuse errors
//!
//! Every derived view both consumes and produces `ListEvent` values, so a
//! view's output can be another view's source.
//!
//! # Example
//!
//! ```rust
//! use vitre_core::{ListEvent, EventKind};
//!
//! let ev = ListEvent::added_at(vec![10, 20], 3);
//! assert_eq!(ev.kind(), EventKind::Add);
//! assert_eq!(ev.index(), Some(3));
//!
//! // Index-less events must be resolved by equality, never positionally.
//! let ev = ListEvent::removed(vec![10]);
//! assert_eq!(ev.index(), None);
//! ```

#![no_std]

extern crate alloc;

pub mod error;
pub mod event;

pub use error::{Error, Result};
pub use event::{EventKind, ListEvent};
