#![forbid(unsafe_code)]

mod classfile;
mod constant_pool;
mod error;
mod positions;
mod reader;

pub use crate::classfile::{
    ClassFile, ClassMember, ACC_INTERFACE, ACC_MODULE, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC,
    CLASS_MAGIC,
};
pub use crate::error::{Error, Result};
pub use crate::positions::DebugPositions;
