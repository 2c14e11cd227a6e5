//! Locating and rewriting debug position metadata.
//!
//! Two pieces of a class file say where its code came from: the class-level
//! `SourceFile` attribute (a file name) and the `LineNumberTable` attributes
//! nested in every method's `Code` attribute. [`DebugPositions`] records the
//! byte offsets of both so they can be rewritten without re-encoding the
//! rest of the file.
//!
//! Line entries are fixed-width `u2` values and are patched in place. The
//! source file name is never edited in place, because the same `Utf8`
//! constant may be referenced from elsewhere (string literals, annotations).
//! Instead an existing constant with the new value is reused, or a new one is
//! appended at the end of the constant pool. Nothing in a class file refers
//! to absolute byte offsets, so growing the pool is safe.

use crate::classfile::CLASS_MAGIC;
use crate::constant_pool::{encode_modified_utf8, ConstantPool};
use crate::error::{Error, Result};
use crate::reader::Reader;

const CONSTANT_POOL_COUNT_OFFSET: usize = 8;
const TAG_UTF8: u8 = 1;

#[derive(Debug, Clone)]
pub struct DebugPositions<'a> {
    bytes: &'a [u8],
    cp: ConstantPool,
    source_file: Option<SourceFileAttr>,
    /// Absolute offsets of every `line_number` field.
    line_offsets: Vec<usize>,
}

#[derive(Debug, Clone)]
struct SourceFileAttr {
    index_offset: usize,
    name: String,
}

impl<'a> DebugPositions<'a> {
    pub fn read(bytes: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != CLASS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        reader.read_u2()?; // minor_version
        reader.read_u2()?; // major_version
        let cp = ConstantPool::parse(&mut reader)?;

        reader.read_u2()?; // access_flags
        reader.read_u2()?; // this_class
        reader.read_u2()?; // super_class
        let interfaces_count = reader.read_u2()? as usize;
        reader.skip(interfaces_count * 2)?;

        let mut line_offsets = Vec::new();

        let fields_count = reader.read_u2()? as usize;
        for _ in 0..fields_count {
            read_member(&mut reader, &cp, &mut line_offsets)?;
        }
        let methods_count = reader.read_u2()? as usize;
        for _ in 0..methods_count {
            read_member(&mut reader, &cp, &mut line_offsets)?;
        }

        let mut source_file = None;
        let attributes_count = reader.read_u2()? as usize;
        for _ in 0..attributes_count {
            let name = cp.get_utf8(reader.read_u2()?)?;
            let mut sub = reader.sub_reader()?;
            if name == "SourceFile" {
                let index_offset = sub.offset();
                let index = sub.read_u2()?;
                sub.ensure_empty()
                    .map_err(|_| Error::MalformedAttribute("SourceFile"))?;
                source_file = Some(SourceFileAttr {
                    index_offset,
                    name: cp.get_utf8(index)?.to_string(),
                });
            }
        }
        reader.ensure_empty()?;

        Ok(Self {
            bytes,
            cp,
            source_file,
            line_offsets,
        })
    }

    /// The `SourceFile` attribute value, if the class has one.
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_ref().map(|attr| attr.name.as_str())
    }

    /// Every line number in every `LineNumberTable`, in file order.
    pub fn line_numbers(&self) -> Vec<u16> {
        self.line_offsets
            .iter()
            .map(|&offset| read_u2_at(self.bytes, offset))
            .collect()
    }

    /// Returns a copy of the class file with `shift` added to every line
    /// number and the `SourceFile` attribute (when present) pointing at
    /// `source_file`.
    ///
    /// Shifted lines are clamped to `1..=u16::MAX`.
    pub fn rewrite(&self, shift: i32, source_file: &str) -> Result<Vec<u8>> {
        let mut out = self.bytes.to_vec();

        if shift != 0 {
            for &offset in &self.line_offsets {
                let line = read_u2_at(self.bytes, offset) as i64;
                let shifted = (line + shift as i64).clamp(1, u16::MAX as i64) as u16;
                out[offset..offset + 2].copy_from_slice(&shifted.to_be_bytes());
            }
        }

        let Some(attr) = &self.source_file else {
            return Ok(out);
        };
        if attr.name == source_file {
            return Ok(out);
        }

        let index = match self.cp.find_utf8(source_file) {
            Some(index) => index,
            None => {
                let index = self.cp.count();
                if index >= u16::MAX as usize {
                    return Err(Error::ConstantPoolFull);
                }
                let encoded = encode_modified_utf8(source_file);
                let len = u16::try_from(encoded.len()).map_err(|_| Error::InvalidModifiedUtf8)?;

                let mut entry = Vec::with_capacity(encoded.len() + 3);
                entry.push(TAG_UTF8);
                entry.extend_from_slice(&len.to_be_bytes());
                entry.extend_from_slice(&encoded);

                let new_count = (index + 1) as u16;
                out[CONSTANT_POOL_COUNT_OFFSET..CONSTANT_POOL_COUNT_OFFSET + 2]
                    .copy_from_slice(&new_count.to_be_bytes());
                // Patch the attribute before splicing; its offset is past the pool.
                out[attr.index_offset..attr.index_offset + 2]
                    .copy_from_slice(&(index as u16).to_be_bytes());
                let end = self.cp.end_offset();
                out.splice(end..end, entry);
                return Ok(out);
            }
        };

        out[attr.index_offset..attr.index_offset + 2].copy_from_slice(&index.to_be_bytes());
        Ok(out)
    }
}

fn read_u2_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_member(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    line_offsets: &mut Vec<usize>,
) -> Result<()> {
    reader.read_u2()?; // access_flags
    reader.read_u2()?; // name_index
    reader.read_u2()?; // descriptor_index
    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name = cp.get_utf8(reader.read_u2()?)?;
        let mut sub = reader.sub_reader()?;
        if name == "Code" {
            read_code(&mut sub, cp, line_offsets)
                .map_err(|_| Error::MalformedAttribute("Code"))?;
        }
    }
    Ok(())
}

fn read_code(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    line_offsets: &mut Vec<usize>,
) -> Result<()> {
    reader.read_u2()?; // max_stack
    reader.read_u2()?; // max_locals
    let code_length = reader.read_u4()? as usize;
    reader.skip(code_length)?;
    let exception_table_length = reader.read_u2()? as usize;
    reader.skip(exception_table_length * 8)?;

    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name = cp.get_utf8(reader.read_u2()?)?;
        let mut sub = reader.sub_reader()?;
        if name == "LineNumberTable" {
            let count = sub.read_u2()? as usize;
            for _ in 0..count {
                sub.read_u2()?; // start_pc
                line_offsets.push(sub.offset());
                sub.read_u2()?;
            }
            sub.ensure_empty()
                .map_err(|_| Error::MalformedAttribute("LineNumberTable"))?;
        }
    }
    reader.ensure_empty()
}
