use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use stash_persist::{
    DumpContext, Mapped, ObjectId, Persist, PersistError, Resolved, RestoreContext, Result,
};

use crate::prim::{DumpPrimitives, RestorePrimitives};

/// A shared, mutable node in an object graph.
pub type Shared<T> = Rc<RefCell<T>>;

/// A shared object addressed through `dyn Any`, serialized via the callback
/// registries.
pub type SharedAny = Rc<RefCell<Box<dyn Any>>>;

/// A shared object addressed through [`Persist`], serialized via the
/// interface registries.
pub type SharedPersist = Rc<RefCell<Box<dyn Persist>>>;

/// Dump an optional shared reference.
///
/// Wire shape: the magic number alone for null and already-written nodes,
/// or the magic number followed by the body on first sight.
pub fn dump_shared<T: Any>(
    ctx: &mut DumpContext<'_>,
    obj: &Option<Shared<T>>,
    dump_body: impl Fn(&mut DumpContext<'_>, &T) -> Result<()>,
) -> Result<()> {
    let Some(rc) = obj else {
        return ctx.put_u32(0);
    };
    match ctx.map_object(ObjectId::of_rc(rc)) {
        Mapped::Seen(magic) => ctx.put_u32(magic),
        Mapped::First(magic) => {
            ctx.put_u32(magic)?;
            dump_body(ctx, &rc.borrow())
        }
    }
}

/// Restore an optional shared reference dumped by [`dump_shared`].
///
/// The first appearance of a magic number allocates a default `T` and binds
/// it before `restore_body` runs, so aliases inside the body — a cycle back
/// to this very node included — resolve to the same allocation. That
/// ordering is a correctness requirement, not an optimization.
pub fn restore_shared<T: Any + Default>(
    ctx: &mut RestoreContext<'_>,
    restore_body: impl Fn(&mut RestoreContext<'_>, &mut T) -> Result<()>,
) -> Result<Option<Shared<T>>> {
    let magic = ctx.get_u32()?;
    match ctx.resolve_object(magic) {
        Resolved::Null => Ok(None),
        Resolved::Object(handle) => {
            let rc = handle
                .downcast::<RefCell<T>>()
                .map_err(|_| PersistError::TypeMismatch(std::any::type_name::<T>()))?;
            Ok(Some(rc))
        }
        Resolved::Unknown => {
            let rc: Shared<T> = Rc::new(RefCell::new(T::default()));
            ctx.bind_object(magic, rc.clone())?;
            restore_body(ctx, &mut rc.borrow_mut())?;
            Ok(Some(rc))
        }
    }
}

/// Dump an optional shared polymorphic object through the callback
/// registry.
///
/// First sight writes `[magic][type-key][body]`; the key is looked up by
/// the value's runtime type and selects the reader's (create, restore)
/// pair. An unregistered runtime type aborts the pass.
pub fn dump_any(ctx: &mut DumpContext<'_>, obj: &Option<SharedAny>) -> Result<()> {
    let Some(rc) = obj else {
        return ctx.put_u32(0);
    };
    match ctx.map_object(ObjectId::of_rc(rc)) {
        Mapped::Seen(magic) => ctx.put_u32(magic),
        Mapped::First(magic) => {
            ctx.put_u32(magic)?;
            let body = rc.borrow();
            let entry = ctx.lookup_callback(body.as_ref().type_id())?;
            ctx.put_u32(entry.key)?;
            (*entry.dump)(ctx, body.as_ref())
        }
    }
}

/// Restore an optional shared polymorphic object dumped by [`dump_any`].
pub fn restore_any(ctx: &mut RestoreContext<'_>) -> Result<Option<SharedAny>> {
    let magic = ctx.get_u32()?;
    match ctx.resolve_object(magic) {
        Resolved::Null => Ok(None),
        Resolved::Object(handle) => {
            let rc = handle
                .downcast::<RefCell<Box<dyn Any>>>()
                .map_err(|_| PersistError::TypeMismatch("a shared callback object"))?;
            Ok(Some(rc))
        }
        Resolved::Unknown => {
            let key = ctx.get_u32()?;
            let entry = ctx.lookup_callback(key)?;
            let rc: SharedAny = Rc::new(RefCell::new((*entry.create)()));
            ctx.bind_object(magic, rc.clone())?;
            let mut body = rc.borrow_mut();
            (*entry.restore)(ctx, body.as_mut())?;
            drop(body);
            Ok(Some(rc))
        }
    }
}

/// Dump an optional shared object addressed through [`Persist`], using the
/// interface registry for the type key and the object's own
/// [`Persist::dump`] for the body.
pub fn dump_interface(ctx: &mut DumpContext<'_>, obj: &Option<SharedPersist>) -> Result<()> {
    let Some(rc) = obj else {
        return ctx.put_u32(0);
    };
    match ctx.map_object(ObjectId::of_rc(rc)) {
        Mapped::Seen(magic) => ctx.put_u32(magic),
        Mapped::First(magic) => {
            ctx.put_u32(magic)?;
            let body = rc.borrow();
            let key = ctx.lookup_interface(body.as_any().type_id())?;
            ctx.put_u32(key)?;
            body.dump(ctx)
        }
    }
}

/// Restore an optional shared object dumped by [`dump_interface`]: clone a
/// blank from the registered prototype, bind it, then let it restore its
/// own fields.
pub fn restore_interface(ctx: &mut RestoreContext<'_>) -> Result<Option<SharedPersist>> {
    let magic = ctx.get_u32()?;
    match ctx.resolve_object(magic) {
        Resolved::Null => Ok(None),
        Resolved::Object(handle) => {
            let rc = handle
                .downcast::<RefCell<Box<dyn Persist>>>()
                .map_err(|_| PersistError::TypeMismatch("a shared interface object"))?;
            Ok(Some(rc))
        }
        Resolved::Unknown => {
            let key = ctx.get_u32()?;
            let blank = ctx.lookup_interface(key)?.blank();
            let rc: SharedPersist = Rc::new(RefCell::new(blank));
            ctx.bind_object(magic, rc.clone())?;
            rc.borrow_mut().restore(ctx)?;
            Ok(Some(rc))
        }
    }
}
