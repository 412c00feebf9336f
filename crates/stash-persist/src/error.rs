use std::any::TypeId;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PersistError>;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("type {0:?} not registered on this context")]
    UnregisteredType(TypeId),

    #[error("type key {0} not registered on this context")]
    UnregisteredKey(u32),

    #[error("magic number {0} is already bound")]
    DuplicateBinding(u32),

    #[error("expected a value of type {0}")]
    TypeMismatch(&'static str),

    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),

    #[error("utf-8 decoding failed: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
