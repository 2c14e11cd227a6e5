use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

pub const CLASS_MAGIC: u32 = 0xCAFEBABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_MODULE: u16 = 0x8000;

const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    /// Value of the `SourceFile` attribute, if present.
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

impl ClassMember {
    fn is_main(&self) -> bool {
        self.name == "main"
            && self.descriptor == MAIN_DESCRIPTOR
            && self.access_flags & (ACC_PUBLIC | ACC_STATIC) == ACC_PUBLIC | ACC_STATIC
    }
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != CLASS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_member(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut reader, &cp)?);
        }

        let mut source_file = None;
        let attributes_count = reader.read_u2()? as usize;
        for _ in 0..attributes_count {
            let name = cp.get_utf8(reader.read_u2()?)?;
            let mut sub = reader.sub_reader()?;
            if name == "SourceFile" {
                source_file = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()
                    .map_err(|_| Error::MalformedAttribute("SourceFile"))?;
            }
        }

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            source_file,
        })
    }

    /// Binary name of the class, with `.` separators (`com.example.Main`).
    pub fn binary_name(&self) -> String {
        self.this_class.replace('/', ".")
    }

    /// Whether the class declares `public static void main(String[])` and can
    /// be launched directly.
    pub fn has_main_method(&self) -> bool {
        self.access_flags & (ACC_INTERFACE | ACC_MODULE | ACC_SYNTHETIC) == 0
            && self.methods.iter().any(ClassMember::is_main)
    }
}

fn parse_member(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassMember> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        reader.read_u2()?; // name_index
        reader.sub_reader()?;
    }

    Ok(ClassMember {
        access_flags,
        name,
        descriptor,
    })
}
