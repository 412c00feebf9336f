//! Field-level codecs over the `stash-persist` contexts.
//!
//! Two layers:
//!
//! - [`DumpPrimitives`]/[`RestorePrimitives`]: fixed-width little-endian
//!   primitive encodings (integers, bool, IEEE-754 floats, length-prefixed
//!   bytes/strings) and option/sequence combinators. Every byte moves
//!   through the contexts' single-byte `put`/`get` chokepoint.
//! - the shared-object helpers ([`dump_shared`], [`dump_any`],
//!   [`dump_interface`] and their restore counterparts): the object-graph
//!   protocol itself, expressing sharing, cycles and polymorphism through
//!   magic-number aliases and the contexts' type registries.

mod prim;
mod shared;

pub use crate::prim::{DumpPrimitives, RestorePrimitives};
pub use crate::shared::{
    dump_any, dump_interface, dump_shared, restore_any, restore_interface, restore_shared, Shared,
    SharedAny, SharedPersist,
};
