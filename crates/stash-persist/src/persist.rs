use std::any::Any;

use crate::dump::DumpContext;
use crate::error::Result;
use crate::restore::RestoreContext;

/// Per-type persistence capability.
///
/// Objects implementing `Persist` describe their own fields to a context.
/// The interface registries address them purely through this trait, so a
/// reader never needs compile-time knowledge of the concrete subtype stored
/// in a stream.
pub trait Persist: Any {
    /// Write this object's fields to the stream.
    fn dump(&self, ctx: &mut DumpContext<'_>) -> Result<()>;

    /// Populate this object's fields from the stream.
    fn restore(&mut self, ctx: &mut RestoreContext<'_>) -> Result<()>;

    /// Allocate a default-initialized instance of the same concrete type.
    ///
    /// The restore side calls this on a registered prototype to obtain the
    /// blank instance the stream's fields are restored into.
    fn blank(&self) -> Box<dyn Persist>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
