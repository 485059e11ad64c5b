//! Audio routing: maps endpoint masks onto mixer controls.
//!
//! A route is a set of [`Endpoint`]s per [`RouteCategory`]. The [`Router`]
//! turns changes to those sets into an ordered sequence of mixer writes
//! described by static [`RouteTables`], and keeps output gains balanced
//! between media playback and the voice call.

mod endpoint;
mod pin;
mod router;
mod sco;
mod tables;

pub use endpoint::{Endpoint, EndpointMask, RouteCategory};
pub use pin::{PinConfig, PinValue, PinWrite};
pub use router::Router;
pub use sco::{ScoLink, ScoPath};
pub use tables::{RouteEntry, RouteTables, VolumeControl, DEFAULT_TABLES};
