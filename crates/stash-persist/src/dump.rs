use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::error::{PersistError, Result};
use crate::format::{host_little_endian, version_supported};
use crate::ident::{Mapped, ObjectId};

/// Type-erased dump callback.
///
/// Stored behind `Rc` so a lookup hands the callback out by value and the
/// registry borrow ends before the callback re-enters the context.
pub type DumpFn = Rc<dyn Fn(&mut DumpContext<'_>, &dyn Any) -> Result<()>>;

/// Registration record for one concrete type on the dump side.
#[derive(Clone)]
pub struct DumpEntry {
    /// The key embedded in the stream as this type's discriminator.
    pub key: u32,
    pub dump: DumpFn,
}

/// Drives one serialization pass over an output byte stream.
///
/// A context is single-use: one stream, one full pass, then discarded. It is
/// not reentrant and not shareable across threads; registrations and the
/// identity map are plain mutable state.
pub struct DumpContext<'a> {
    device: &'a mut dyn Write,
    version: u8,
    little_endian: bool,
    max_key: u32,
    magics: HashMap<ObjectId, u32>,
    callbacks: HashMap<TypeId, DumpEntry>,
    interfaces: HashMap<TypeId, u32>,
}

impl<'a> DumpContext<'a> {
    /// Wrap `device` for one dump pass using format revision `version`.
    ///
    /// The version tag is the first byte of the stream. It is written before
    /// validation, so a failed construction leaves exactly that byte behind.
    pub fn new(device: &'a mut dyn Write, version: u8) -> Result<Self> {
        let mut ctx = DumpContext {
            device,
            version,
            little_endian: host_little_endian(),
            max_key: 0,
            magics: HashMap::new(),
            callbacks: HashMap::new(),
            interfaces: HashMap::new(),
        };
        // The null reference is permanently magic number 0.
        ctx.magics.insert(ObjectId::NULL, 0);
        ctx.put(version)?;
        if !version_supported(version) {
            return Err(PersistError::UnsupportedVersion(version));
        }
        Ok(ctx)
    }

    /// Write one byte.
    ///
    /// All higher-level encoding funnels through this single-byte primitive,
    /// so a device failure is detected at the first bad byte.
    pub fn put(&mut self, byte: u8) -> Result<()> {
        self.device.write_all(&[byte])?;
        Ok(())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether the host is little-endian.
    ///
    /// The on-disk order is fixed little-endian; callers copying raw
    /// multi-byte memory consult this to decide whether a swap is needed.
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// Map an object identity to its magic number for this pass.
    ///
    /// The first encounter of a distinct non-null id assigns the next dense
    /// magic number and asks the caller to write the full object body;
    /// every later encounter (and [`ObjectId::NULL`], always magic 0) is an
    /// alias and the caller writes the magic number alone.
    pub fn map_object(&mut self, id: ObjectId) -> Mapped {
        if let Some(&magic) = self.magics.get(&id) {
            return Mapped::Seen(magic);
        }
        let magic = self.magics.len() as u32;
        self.magics.insert(id, magic);
        Mapped::First(magic)
    }

    /// Register a dump callback for concrete type `T`, returning the key
    /// that discriminates `T` in the stream.
    pub fn register_callback<T, F>(&mut self, dump: F) -> u32
    where
        T: Any,
        F: Fn(&mut DumpContext<'_>, &T) -> Result<()> + 'static,
    {
        let key = self.next_key();
        let erased: DumpFn = Rc::new(move |ctx: &mut DumpContext<'_>, value: &dyn Any| {
            let value = value
                .downcast_ref::<T>()
                .ok_or(PersistError::TypeMismatch(std::any::type_name::<T>()))?;
            dump(ctx, value)
        });
        self.callbacks
            .insert(TypeId::of::<T>(), DumpEntry { key, dump: erased });
        key
    }

    pub fn is_callback(&self, type_id: TypeId) -> bool {
        self.callbacks.contains_key(&type_id)
    }

    /// Look up the registration for a runtime type.
    ///
    /// An unregistered type is a caller/configuration bug, never silently
    /// tolerated.
    pub fn lookup_callback(&self, type_id: TypeId) -> Result<DumpEntry> {
        self.callbacks
            .get(&type_id)
            .cloned()
            .ok_or(PersistError::UnregisteredType(type_id))
    }

    /// Register an abstract-interface marker for `T`: a key with no
    /// callback. Keys share one counter with [`Self::register_callback`], so
    /// they are globally unique per context.
    pub fn register_interface<T: Any>(&mut self) -> u32 {
        let key = self.next_key();
        self.interfaces.insert(TypeId::of::<T>(), key);
        key
    }

    pub fn is_interface(&self, type_id: TypeId) -> bool {
        self.interfaces.contains_key(&type_id)
    }

    pub fn lookup_interface(&self, type_id: TypeId) -> Result<u32> {
        self.interfaces
            .get(&type_id)
            .copied()
            .ok_or(PersistError::UnregisteredType(type_id))
    }

    /// Run `installer` once over this context so an application can install
    /// its whole type universe in one call. `None` is a no-op.
    ///
    /// Writer and reader must run matching installer sequences: keys are
    /// assigned in registration order and must line up on both sides.
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
