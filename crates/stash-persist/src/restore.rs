use std::any::Any;
use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;

use crate::error::{PersistError, Result};
use crate::format::{host_little_endian, version_supported};
use crate::ident::{Resolved, SharedHandle};
use crate::persist::Persist;

/// Type-erased allocator for one registered concrete type.
pub type CreateFn = Rc<dyn Fn() -> Box<dyn Any>>;

/// Type-erased restore callback for one registered concrete type.
pub type RestoreFn = Rc<dyn Fn(&mut RestoreContext<'_>, &mut dyn Any) -> Result<()>>;

/// Registration record for one concrete type on the restore side.
#[derive(Clone)]
pub struct RestoreEntry {
    pub create: CreateFn,
    pub restore: RestoreFn,
}

/// Drives one deserialization pass over an input byte stream; the mirror
/// image of [`crate::DumpContext`].
///
/// The context owns every prototype instance registered through
/// [`Self::register_interface`] and drops each exactly once when the context
/// is dropped, on every exit path.
pub struct RestoreContext<'a> {
    device: &'a mut dyn Read,
    version: u8,
    little_endian: bool,
    max_key: u32,
    handles: HashMap<u32, SharedHandle>,
    callbacks: HashMap<u32, RestoreEntry>,
    interfaces: HashMap<u32, Box<dyn Persist>>,
}

impl<'a> RestoreContext<'a> {
    /// Wrap `device` for one restore pass.
    ///
    /// Reads the first byte as the version tag and validates it before
    /// anything else; no bytes beyond the tag are consumed on failure.
    pub fn new(device: &'a mut dyn Read) -> Result<Self> {
        let mut ctx = RestoreContext {
            device,
            version: 0,
            little_endian: host_little_endian(),
            max_key: 0,
            handles: HashMap::new(),
            callbacks: HashMap::new(),
            interfaces: HashMap::new(),
        };
        ctx.version = ctx.get()?;
        if !version_supported(ctx.version) {
            return Err(PersistError::UnsupportedVersion(ctx.version));
        }
        Ok(ctx)
    }

    /// Read one byte.
    ///
    /// Fails exactly when the device cannot supply one more byte. The format
    /// is not self-terminating: running out of bytes mid-value is always an
    /// error, never a valid end-of-data signal.
    pub fn get(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.device.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether the host is little-endian. See
    /// [`crate::DumpContext::little_endian`].
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// Look up the object previously bound to `magic`.
    ///
    /// Magic 0 always resolves to [`Resolved::Null`]. A magic number that
    /// has not been bound yet reports [`Resolved::Unknown`] so the caller
    /// can allocate the real instance; no placeholder is ever fabricated.
    pub fn resolve_object(&self, magic: u32) -> Resolved {
        if magic == 0 {
            return Resolved::Null;
        }
        match self.handles.get(&magic) {
            Some(handle) => Resolved::Object(handle.clone()),
            None => Resolved::Unknown,
        }
    }

    /// Record that `magic` now refers to `handle`.
    ///
    /// Callers bind immediately after allocating, before descending into the
    /// object's body, so aliases inside the body (including cycles back to
    /// this object) resolve. A magic number can be bound once per pass;
    /// rebinding, or binding the reserved magic 0, is an integrity error.
    pub fn bind_object(&mut self, magic: u32, handle: SharedHandle) -> Result<()> {
        if magic == 0 || self.handles.contains_key(&magic) {
            return Err(PersistError::DuplicateBinding(magic));
        }
        self.handles.insert(magic, handle);
        Ok(())
    }

    /// Register the (create, restore) pair for one concrete type. `create`
    /// produces a blank `T`; `restore` populates it from the context.
    /// Returns the key the writer side embeds in the stream for `T`.
    pub fn register_callback<T, C, R>(&mut self, create: C, restore: R) -> u32
    where
        T: Any,
        C: Fn() -> T + 'static,
        R: Fn(&mut RestoreContext<'_>, &mut T) -> Result<()> + 'static,
    {
        let key = self.next_key();
        let create: CreateFn = Rc::new(move || Box::new(create()) as Box<dyn Any>);
        let restore: RestoreFn =
            Rc::new(move |ctx: &mut RestoreContext<'_>, value: &mut dyn Any| {
                let value = value
                    .downcast_mut::<T>()
                    .ok_or(PersistError::TypeMismatch(std::any::type_name::<T>()))?;
                restore(ctx, value)
            });
        self.callbacks.insert(key, RestoreEntry { create, restore });
        key
    }

    pub fn is_callback(&self, key: u32) -> bool {
        self.callbacks.contains_key(&key)
    }

    /// Look up the create/restore pair for a key read from the stream.
    ///
    /// An unknown key means the writer and reader were built with different
    /// registration sets; the pass must abort.
    pub fn lookup_callback(&self, key: u32) -> Result<RestoreEntry> {
        self.callbacks
            .get(&key)
            .cloned()
            .ok_or(PersistError::UnregisteredKey(key))
    }

    /// Register a prototype instance for one abstract interface.
    ///
    /// The context takes ownership of the prototype; the restore path clones
    /// blanks from it via [`Persist::blank`].
    pub fn register_interface(&mut self, sample: Box<dyn Persist>) -> u32 {
        let key = self.next_key();
        self.interfaces.insert(key, sample);
        key
    }

    pub fn is_interface(&self, key: u32) -> bool {
        self.interfaces.contains_key(&key)
    }

    pub fn lookup_interface(&self, key: u32) -> Result<&dyn Persist> {
        self.interfaces
            .get(&key)
            .map(|sample| sample.as_ref())
            .ok_or(PersistError::UnregisteredKey(key))
    }

    /// Run `installer` once over this context. `None` is a no-op. See
    /// [`crate::DumpContext::register_all`] for the key-symmetry contract.
    pub fn register_all<F>(&mut self, installer: Option<F>)
    where
        F: FnOnce(&mut Self),
    {
        if let Some(installer) = installer {
            installer(self);
        }
    }

    fn next_key(&mut self) -> u32 {
        self.max_key += 1;
        self.max_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::io::Cursor;

    use crate::dump::DumpContext;
    use crate::format::{FORMAT_VERSION_V1, FORMAT_VERSION_V2};

    #[test]
    fn construction_reads_and_reports_the_version_tag() {
        for version in [FORMAT_VERSION_V1, FORMAT_VERSION_V2] {
            let mut stream = Vec::new();
            DumpContext::new(&mut stream, version).unwrap();

            let mut cursor = Cursor::new(stream);
            let ctx = RestoreContext::new(&mut cursor).unwrap();
            assert_eq!(ctx.version(), version);
        }
    }

    #[test]
    fn construction_rejects_unknown_versions_consuming_only_the_tag() {
        let mut cursor = Cursor::new(vec![9u8, 0, 0, 0]);
        let err = RestoreContext::new(&mut cursor).err().unwrap();
        assert!(matches!(err, PersistError::UnsupportedVersion(9)));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn construction_fails_on_an_empty_stream() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = RestoreContext::new(&mut cursor).err().unwrap();
        assert!(matches!(err, PersistError::Io(_)));
    }

    #[test]
    fn a_version_only_stream_has_no_further_bytes() {
        // A dump context over an empty sink writes exactly one byte...
        let mut stream = Vec::new();
        DumpContext::new(&mut stream, FORMAT_VERSION_V2).unwrap();
        assert_eq!(stream, vec![FORMAT_VERSION_V2]);

        // ...and the matching restore context reports the version, then
        // fails with an I/O error on any further get.
        let mut cursor = Cursor::new(stream);
        let mut ctx = RestoreContext::new(&mut cursor).unwrap();
        assert_eq!(ctx.version(), FORMAT_VERSION_V2);
        assert!(matches!(ctx.get().unwrap_err(), PersistError::Io(_)));
    }

    #[test]
    fn magic_zero_resolves_to_null_and_unbound_magics_are_unknown() {
        let mut cursor = Cursor::new(vec![FORMAT_VERSION_V2]);
        let ctx = RestoreContext::new(&mut cursor).unwrap();

        assert!(matches!(ctx.resolve_object(0), Resolved::Null));
        assert!(matches!(ctx.resolve_object(1), Resolved::Unknown));
        assert!(matches!(ctx.resolve_object(42), Resolved::Unknown));
    }

    #[test]
    fn binding_makes_a_magic_resolvable() {
        let mut cursor = Cursor::new(vec![FORMAT_VERSION_V2]);
        let mut ctx = RestoreContext::new(&mut cursor).unwrap();

        let value: Rc<dyn Any> = Rc::new(41u32);
        ctx.bind_object(1, value).unwrap();

        match ctx.resolve_object(1) {
            Resolved::Object(handle) => {
                assert_eq!(*handle.downcast::<u32>().unwrap(), 41);
            }
            _ => panic!("magic 1 should be bound"),
        }
    }

    #[test]
    fn rebinding_a_magic_is_an_integrity_error() {
        let mut cursor = Cursor::new(vec![FORMAT_VERSION_V2]);
        let mut ctx = RestoreContext::new(&mut cursor).unwrap();

        ctx.bind_object(1, Rc::new(1u32)).unwrap();
        let err = ctx.bind_object(1, Rc::new(2u32)).unwrap_err();
        assert!(matches!(err, PersistError::DuplicateBinding(1)));

        // The reserved null magic can never be bound either.
        let err = ctx.bind_object(0, Rc::new(3u32)).unwrap_err();
        assert!(matches!(err, PersistError::DuplicateBinding(0)));

        // The original binding survives.
        match ctx.resolve_object(1) {
            Resolved::Object(handle) => {
                assert_eq!(*handle.downcast::<u32>().unwrap(), 1);
            }
            _ => panic!("magic 1 should still be bound"),
        }
    }

    #[test]
    fn unregistered_keys_fail_lookups() {
        let mut cursor = Cursor::new(vec![FORMAT_VERSION_V2]);
        let ctx = RestoreContext::new(&mut cursor).unwrap();

        assert!(!ctx.is_callback(1));
        assert!(!ctx.is_interface(1));
        assert!(matches!(
            ctx.lookup_callback(1).err().unwrap(),
            PersistError::UnregisteredKey(1)
        ));
        assert!(matches!(
            ctx.lookup_interface(1).err().unwrap(),
            PersistError::UnregisteredKey(1)
        ));
    }

    struct CountingProto {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for CountingProto {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl Persist for CountingProto {
        fn dump(&self, _ctx: &mut DumpContext<'_>) -> Result<()> {
            Ok(())
        }

        fn restore(&mut self, _ctx: &mut RestoreContext<'_>) -> Result<()> {
            Ok(())
        }

        fn blank(&self) -> Box<dyn Persist> {
            Box::new(CountingProto {
                drops: self.drops.clone(),
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn dropping_the_context_drops_each_prototype_exactly_once() {
        let drops = Rc::new(Cell::new(0));

        let mut cursor = Cursor::new(vec![FORMAT_VERSION_V2]);
        let mut ctx = RestoreContext::new(&mut cursor).unwrap();
        for _ in 0..3 {
            ctx.register_interface(Box::new(CountingProto {
                drops: drops.clone(),
            }));
        }

        assert_eq!(drops.get(), 0);
        drop(ctx);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn callback_registration_restores_through_the_erased_pair() {
        let mut stream = Vec::new();
        {
            let mut dump = DumpContext::new(&mut stream, FORMAT_VERSION_V2).unwrap();
            dump.put(5).unwrap();
        }

        let mut cursor = Cursor::new(stream);
        let mut ctx = RestoreContext::new(&mut cursor).unwrap();
        let key = ctx.register_callback(
            || 0u8,
            |ctx: &mut RestoreContext<'_>, value: &mut u8| {
                *value = ctx.get()?;
                Ok(())
            },
        );

        let entry = ctx.lookup_callback(key).unwrap();
        let mut blank = (*entry.create)();
        (*entry.restore)(&mut ctx, blank.as_mut()).unwrap();
        assert_eq!(*blank.downcast::<u8>().unwrap(), 5);
    }
}
