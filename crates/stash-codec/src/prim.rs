use stash_persist::{DumpContext, PersistError, RestoreContext, Result, FORMAT_VERSION_V1};

// Version 2 canonicalizes NaN payloads; version 1 preserved raw bits.
const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

// Capacity hint ceiling for length-prefixed decoders. On-stream lengths are
// not trusted for allocation sizing; an oversized claim hits the I/O error
// on the first missing byte instead of reserving gigabytes up front.
const DECODE_CAPACITY_HINT: usize = 64 * 1024;

/// Primitive field encoders layered over [`DumpContext::put`].
///
/// The on-disk order is little-endian regardless of host byte order (the
/// context's `little_endian` flag tells raw-memory callers whether a swap is
/// needed on their side). Every byte is written through the single-byte
/// chokepoint so an I/O failure surfaces at the first bad byte.
pub trait DumpPrimitives {
    fn put_u8(&mut self, v: u8) -> Result<()>;
    fn put_u16(&mut self, v: u16) -> Result<()>;
    fn put_u32(&mut self, v: u32) -> Result<()>;
    fn put_u64(&mut self, v: u64) -> Result<()>;
    fn put_usize(&mut self, v: usize) -> Result<()>;
    fn put_i8(&mut self, v: i8) -> Result<()>;
    fn put_i16(&mut self, v: i16) -> Result<()>;
    fn put_i32(&mut self, v: i32) -> Result<()>;
    fn put_i64(&mut self, v: i64) -> Result<()>;
    fn put_bool(&mut self, v: bool) -> Result<()>;
    fn put_f32(&mut self, v: f32) -> Result<()>;
    fn put_f64(&mut self, v: f64) -> Result<()>;

    /// `u32` length prefix followed by the raw bytes.
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// UTF-8 bytes with a `u32` length prefix.
    fn put_str(&mut self, s: &str) -> Result<()>;

    /// 0/1 tag byte, then the payload for `Some`.
    fn put_option<T>(
        &mut self,
        v: &Option<T>,
        f: impl Fn(&mut Self, &T) -> Result<()>,
    ) -> Result<()>;

    /// `u32` element count, then each element in order.
    fn put_seq<T>(&mut self, items: &[T], f: impl Fn(&mut Self, &T) -> Result<()>) -> Result<()>;
}

impl DumpPrimitives for DumpContext<'_> {
    fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put(v)
    }

    fn put_u16(&mut self, v: u16) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_u32(&mut self, v: u32) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_u64(&mut self, v: u64) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_usize(&mut self, v: usize) -> Result<()> {
        self.put_u64(v as u64)
    }

    fn put_i8(&mut self, v: i8) -> Result<()> {
        self.put(v as u8)
    }

    fn put_i16(&mut self, v: i16) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_i32(&mut self, v: i32) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_i64(&mut self, v: i64) -> Result<()> {
        for byte in v.to_le_bytes() {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_bool(&mut self, v: bool) -> Result<()> {
        self.put(v as u8)
    }

    fn put_f32(&mut self, v: f32) -> Result<()> {
        let bits = if v.is_nan() && self.version() != FORMAT_VERSION_V1 {
            CANONICAL_NAN_F32
        } else {
            v.to_bits()
        };
        self.put_u32(bits)
    }

    fn put_f64(&mut self, v: f64) -> Result<()> {
        let bits = if v.is_nan() && self.version() != FORMAT_VERSION_V1 {
            CANONICAL_NAN_F64
        } else {
            v.to_bits()
        };
        self.put_u64(bits)
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len: u32 = bytes
            .len()
            .try_into()
            .map_err(|_| PersistError::Corrupt("length does not fit in u32"))?;
        self.put_u32(len)?;
        for &byte in bytes {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_str(&mut self, s: &str) -> Result<()> {
        self.put_bytes(s.as_bytes())
    }

    fn put_option<T>(
        &mut self,
        v: &Option<T>,
        f: impl Fn(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        match v {
            None => self.put(0),
            Some(value) => {
                self.put(1)?;
                f(self, value)
            }
        }
    }

    fn put_seq<T>(&mut self, items: &[T], f: impl Fn(&mut Self, &T) -> Result<()>) -> Result<()> {
        let len: u32 = items
            .len()
            .try_into()
            .map_err(|_| PersistError::Corrupt("length does not fit in u32"))?;
        self.put_u32(len)?;
        for item in items {
            f(self, item)?;
        }
        Ok(())
    }
}

/// Primitive field decoders layered over [`RestoreContext::get`], the
/// mirror image of [`DumpPrimitives`].
pub trait RestorePrimitives {
    fn get_u8(&mut self) -> Result<u8>;
    fn get_u16(&mut self) -> Result<u16>;
    fn get_u32(&mut self) -> Result<u32>;
    fn get_u64(&mut self) -> Result<u64>;
    fn get_usize(&mut self) -> Result<usize>;
    fn get_i8(&mut self) -> Result<i8>;
    fn get_i16(&mut self) -> Result<i16>;
    fn get_i32(&mut self) -> Result<i32>;
    fn get_i64(&mut self) -> Result<i64>;
    fn get_bool(&mut self) -> Result<bool>;
    fn get_f32(&mut self) -> Result<f32>;
    fn get_f64(&mut self) -> Result<f64>;
    fn get_bytes(&mut self) -> Result<Vec<u8>>;
    fn get_str(&mut self) -> Result<String>;
    fn get_option<T>(&mut self, f: impl Fn(&mut Self) -> Result<T>) -> Result<Option<T>>;
    fn get_seq<T>(&mut self, f: impl Fn(&mut Self) -> Result<T>) -> Result<Vec<T>>;
}

impl RestorePrimitives for RestoreContext<'_> {
    fn get_u8(&mut self) -> Result<u8> {
        self.get()
    }

    fn get_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        for byte in &mut buf {
            *byte = self.get()?;
        }
        Ok(u16::from_le_bytes(buf))
    }

    fn get_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        for byte in &mut buf {
            *byte = self.get()?;
        }
        Ok(u32::from_le_bytes(buf))
    }

    fn get_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        for byte in &mut buf {
            *byte = self.get()?;
        }
        Ok(u64::from_le_bytes(buf))
    }

    fn get_usize(&mut self) -> Result<usize> {
        self.get_u64()?
            .try_into()
            .map_err(|_| PersistError::Corrupt("length does not fit in usize"))
    }

    fn get_i8(&mut self) -> Result<i8> {
        Ok(self.get()? as i8)
    }

    fn get_i16(&mut self) -> Result<i16> {
        Ok(self.get_u16()? as i16)
    }

    fn get_i32(&mut self) -> Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    fn get_i64(&mut self) -> Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    fn get_bool(&mut self) -> Result<bool> {
        match self.get()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(PersistError::Corrupt("bool byte")),
        }
    }

    fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        let mut bytes = Vec::with_capacity(len.min(DECODE_CAPACITY_HINT));
        for _ in 0..len {
            bytes.push(self.get()?);
        }
        Ok(bytes)
    }

    fn get_str(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.get_bytes()?)?)
    }

    fn get_option<T>(&mut self, f: impl Fn(&mut Self) -> Result<T>) -> Result<Option<T>> {
        match self.get()? {
            0 => Ok(None),
            1 => Ok(Some(f(self)?)),
            _ => Err(PersistError::Corrupt("option tag")),
        }
    }

    fn get_seq<T>(&mut self, f: impl Fn(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let len = self.get_u32()? as usize;
        let mut items = Vec::with_capacity(len.min(DECODE_CAPACITY_HINT));
        for _ in 0..len {
            items.push(f(self)?);
        }
        Ok(items)
    }
}
