/// First supported format revision. Streams older than this are rejected.
pub const FORMAT_VERSION_V1: u8 = 1;
/// Current format revision. Version 2 canonicalizes NaN payloads in the
/// float codecs; version 1 preserved raw bit patterns.
pub const FORMAT_VERSION_V2: u8 = 2;

pub const FORMAT_VERSION_CURRENT: u8 = FORMAT_VERSION_V2;

pub(crate) fn version_supported(version: u8) -> bool {
    matches!(version, FORMAT_VERSION_V1 | FORMAT_VERSION_V2)
}

/// Byte order of the host, probed once per context.
///
/// The on-disk order is fixed little-endian; this flag exists so callers
/// copying raw multi-byte memory can decide whether a swap is needed.
pub(crate) fn host_little_endian() -> bool {
    cfg!(target_endian = "little")
}
