//! Serialization contexts for binary object-graph streams.
//!
//! One [`DumpContext`]/[`RestoreContext`] pair wraps one byte stream each for
//! the duration of one pass. The stream layout is:
//!
//! - byte 0: format version tag (one of two supported revisions)
//! - thereafter: an ordered sequence of fields, each either a primitive
//!   encoding (owned by the codec layer) or an object reference:
//!   `[magic]` alone for null and already-written objects, `[magic][body]`
//!   (or `[magic][type-key][body]` for polymorphic objects) on first sight.
//!
//! There is no end-of-stream marker; the overall length follows from the
//! shape of the graph, known to both sides by symmetry of the dump and
//! restore code paths. Running out of bytes mid-value is always an error.
//!
//! Sharing and cycles are expressed through the identity maps: the dump side
//! assigns each distinct object a dense magic number on first encounter, and
//! the restore side binds each magic number to the reconstructed object
//! *before* descending into its body, so a cycle back to the same object
//! resolves to the same allocation.
//!
//! Polymorphic objects are resolved through the type registries: the dump
//! side maps a runtime type to a numeric key and a dump callback, the
//! restore side maps the key back to a (create, restore) callback pair or to
//! an owned prototype instance implementing [`Persist`]. Writer and reader
//! must install the same registrations in the same order so keys line up.

mod dump;
mod error;
mod format;
mod ident;
mod persist;
mod restore;

pub use crate::dump::{DumpContext, DumpEntry, DumpFn};
pub use crate::error::{PersistError, Result};
pub use crate::format::{FORMAT_VERSION_CURRENT, FORMAT_VERSION_V1, FORMAT_VERSION_V2};
pub use crate::ident::{Mapped, ObjectId, Resolved, SharedHandle};
pub use crate::persist::Persist;
pub use crate::restore::{CreateFn, RestoreContext, RestoreEntry, RestoreFn};
