use crate::error::{Error, Result};
use crate::reader::Reader;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    Utf8(String),
    /// A Utf8 entry holding an unpaired surrogate (legal in class files, e.g.
    /// the string literal `"\uD800"`). Readable, but never matched by value.
    Utf8Lossy(String),
    Class { name_index: u16 },
    /// Entries Kiln never needs to look inside.
    Opaque(&'static str),
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) | CpInfo::Utf8Lossy(_) => "Utf8",
            CpInfo::Class { .. } => "Class",
            CpInfo::Opaque(kind) => kind,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConstantPool {
    /// Index 0 and the second slot of Long/Double entries are `None`.
    entries: Vec<Option<CpInfo>>,
    /// Absolute offset of the first byte after the pool.
    end_offset: usize,
}

impl ConstantPool {
    /// Parses the `constant_pool_count` and the pool itself.
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(None);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let (info, wide) = match tag {
                TAG_UTF8 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    (decode_modified_utf8(bytes)?, false)
                }
                TAG_CLASS => (
                    CpInfo::Class {
                        name_index: reader.read_u2()?,
                    },
                    false,
                ),
                TAG_INTEGER | TAG_FLOAT => {
                    reader.skip(4)?;
                    (CpInfo::Opaque(if tag == TAG_INTEGER { "Integer" } else { "Float" }), false)
                }
                TAG_LONG | TAG_DOUBLE => {
                    reader.skip(8)?;
                    (CpInfo::Opaque(if tag == TAG_LONG { "Long" } else { "Double" }), true)
                }
                TAG_STRING => {
                    reader.skip(2)?;
                    (CpInfo::Opaque("String"), false)
                }
                TAG_METHOD_TYPE => {
                    reader.skip(2)?;
                    (CpInfo::Opaque("MethodType"), false)
                }
                TAG_MODULE => {
                    reader.skip(2)?;
                    (CpInfo::Opaque("Module"), false)
                }
                TAG_PACKAGE => {
                    reader.skip(2)?;
                    (CpInfo::Opaque("Package"), false)
                }
                TAG_METHOD_HANDLE => {
                    reader.skip(3)?;
                    (CpInfo::Opaque("MethodHandle"), false)
                }
                TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE
                | TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                    reader.skip(4)?;
                    (CpInfo::Opaque("Ref"), false)
                }
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };
            entries.push(Some(info));
            if wide {
                entries.push(None);
            }
        }

        Ok(Self {
            entries,
            end_offset: reader.offset(),
        })
    }

    /// The `constant_pool_count` value (one more than the highest index).
    pub(crate) fn count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(value) | CpInfo::Utf8Lossy(value) => Ok(value),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    /// Index of an existing `Utf8` entry with exactly this value.
    pub(crate) fn find_utf8(&self, value: &str) -> Option<u16> {
        self.entries.iter().position(|entry| {
            matches!(entry, Some(CpInfo::Utf8(existing)) if existing == value)
        })
        .map(|index| index as u16)
    }
}

pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Result<CpInfo> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push((((b0 & 0x1F) as u16) << 6) | (b1 & 0x3F) as u16);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            let b2 = *bytes.get(i + 2).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(
                (((b0 & 0x0F) as u16) << 12) | (((b1 & 0x3F) as u16) << 6) | (b2 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }
    Ok(match String::from_utf16(&units) {
        Ok(value) => CpInfo::Utf8(value),
        Err(_) => CpInfo::Utf8Lossy(String::from_utf16_lossy(&units)),
    })
}

pub(crate) fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
