use std::any::Any;
use std::io::Cursor;

use proptest::prelude::*;

use stash_codec::{restore_any, restore_interface, RestorePrimitives};
use stash_persist::{DumpContext, Persist, Result, RestoreContext};

#[derive(Default)]
struct Blob {
    bytes: Vec<u8>,
    tag: Option<u64>,
}

impl Persist for Blob {
    fn dump(&self, ctx: &mut DumpContext<'_>) -> Result<()> {
        use stash_codec::DumpPrimitives;
        ctx.put_bytes(&self.bytes)?;
        ctx.put_option(&self.tag, |ctx, tag| ctx.put_u64(*tag))
    }

    fn restore(&mut self, ctx: &mut RestoreContext<'_>) -> Result<()> {
        self.bytes = ctx.get_bytes()?;
        self.tag = ctx.get_option(|ctx| ctx.get_u64())?;
        Ok(())
    }

    fn blank(&self) -> Box<dyn Persist> {
        Box::new(Blob::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn restore_blob(ctx: &mut RestoreContext<'_>, blob: &mut Blob) -> Result<()> {
    blob.bytes = ctx.get_bytes()?;
    blob.tag = ctx.get_option(|ctx| ctx.get_u64())?;
    Ok(())
}

fn install_reader(ctx: &mut RestoreContext<'_>) {
    ctx.register_interface(Box::new(Blob::default()));
    ctx.register_callback(Blob::default, restore_blob);
}

proptest! {
    // "Fuzz" the decoders. This is not a replacement for coverage-guided
    // fuzzing, but it does guard against panics on corrupted/truncated
    // inputs: every outcome must be a clean error or a decoded value.
    #[test]
    fn restoring_arbitrary_bytes_never_panics(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let mut cursor = Cursor::new(&data);
        if let Ok(mut ctx) = RestoreContext::new(&mut cursor) {
            ctx.register_all(Some(install_reader));
            let _ = ctx.get_seq(|ctx| restore_interface(ctx));
        }

        let mut cursor = Cursor::new(&data);
        if let Ok(mut ctx) = RestoreContext::new(&mut cursor) {
            ctx.register_all(Some(install_reader));
            let _ = restore_any(&mut ctx);
            let _ = ctx.get_str();
        }
    }
}
