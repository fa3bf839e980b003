//! Domain types for HOTAS input fusion
//!
//! This crate defines the vocabulary shared by the whole workspace: which
//! physical device an event came from ([`Role`]), how a physical control is
//! addressed ([`PhysicalInput`]), which output it can drive ([`VirtualSlot`]),
//! and the fixed virtual controller contract the synthetic device presents.
//! No I/O happens here.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod binding;
pub mod contract;
pub mod input;

pub use binding::{AxisTransform, Binding};
pub use contract::{AxisSpec, ContractError, VirtualSlot};
pub use input::{PhysicalInput, Role, SourceKind};
