use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MAJOR_JAVA_8: u16 = 52;
const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// A minimal, valid class file: one class, optional `SourceFile`, methods
/// whose `Code` is a single `return` plus an optional `LineNumberTable`.
#[derive(Debug, Clone)]
pub struct ClassFixture {
    internal_name: String,
    access_flags: u16,
    source_file: Option<String>,
    methods: Vec<MethodFixture>,
    extra_strings: Vec<String>,
    raw_utf8: Vec<Vec<u8>>,
    long_constant: bool,
}

#[derive(Debug, Clone)]
pub struct MethodFixture {
    name: String,
    descriptor: String,
    access_flags: u16,
    lines: Vec<u16>,
}

impl MethodFixture {
    pub fn new(name: &str, descriptor: &str, access_flags: u16) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            lines: Vec::new(),
        }
    }

    /// `public static void main(String[])`.
    pub fn main() -> Self {
        Self::new("main", MAIN_DESCRIPTOR, 0x0009)
    }

    pub fn lines(mut self, lines: &[u16]) -> Self {
        self.lines = lines.to_vec();
        self
    }
}

impl ClassFixture {
    /// `internal_name` uses `/` separators, e.g. `com/example/Main`.
    pub fn new(internal_name: &str) -> Self {
        Self {
            internal_name: internal_name.to_string(),
            // public + super
            access_flags: 0x0021,
            source_file: None,
            methods: Vec::new(),
            extra_strings: Vec::new(),
            raw_utf8: Vec::new(),
            long_constant: false,
        }
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    pub fn method(mut self, method: MethodFixture) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds `public static void main(String[])` with the given line table.
    pub fn main_method(self, lines: &[u16]) -> Self {
        self.method(MethodFixture::main().lines(lines))
    }

    /// Adds an unrelated `Utf8` constant to the pool.
    pub fn string_constant(mut self, value: &str) -> Self {
        self.extra_strings.push(value.to_string());
        self
    }

    /// Adds a `Utf8` constant with exactly these (modified UTF-8) bytes.
    pub fn raw_utf8_constant(mut self, bytes: &[u8]) -> Self {
        self.raw_utf8.push(bytes.to_vec());
        self
    }

    /// Adds a `Long` constant, which occupies two pool slots.
    pub fn long_constant(mut self) -> Self {
        self.long_constant = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        let this_class = pool.class(&self.internal_name);
        let super_class = pool.class("java/lang/Object");

        let mut methods = Vec::new();
        for method in &self.methods {
            let name = pool.utf8(&method.name);
            let descriptor = pool.utf8(&method.descriptor);
            let code = pool.utf8("Code");
            let line_table = if method.lines.is_empty() {
                None
            } else {
                Some(pool.utf8("LineNumberTable"))
            };
            methods.push((method, name, descriptor, code, line_table));
        }

        let source_file = self
            .source_file
            .as_ref()
            .map(|value| (pool.utf8("SourceFile"), pool.utf8(value)));
        for value in &self.extra_strings {
            pool.utf8(value);
        }
        for bytes in &self.raw_utf8 {
            pool.raw_utf8(bytes);
        }
        if self.long_constant {
            pool.long(0x0102_0304_0506_0708);
        }

        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFEBABE);
        push_u16(&mut out, 0);
        push_u16(&mut out, MAJOR_JAVA_8);
        push_u16(&mut out, pool.next_index);
        out.extend_from_slice(&pool.bytes);

        push_u16(&mut out, self.access_flags);
        push_u16(&mut out, this_class);
        push_u16(&mut out, super_class);
        push_u16(&mut out, 0); // interfaces
        push_u16(&mut out, 0); // fields

        push_u16(&mut out, methods.len() as u16);
        for (method, name, descriptor, code, line_table) in methods {
            push_u16(&mut out, method.access_flags);
            push_u16(&mut out, name);
            push_u16(&mut out, descriptor);
            push_u16(&mut out, 1);

            let mut body = Vec::new();
            push_u16(&mut body, 1); // max_stack
            push_u16(&mut body, 1); // max_locals
            push_u32(&mut body, 1); // code_length
            body.push(0xB1); // return
            push_u16(&mut body, 0); // exception_table_length
            match line_table {
                Some(line_table) => {
                    push_u16(&mut body, 1);
                    push_u16(&mut body, line_table);
                    push_u32(&mut body, 2 + 4 * method.lines.len() as u32);
                    push_u16(&mut body, method.lines.len() as u16);
                    for line in &method.lines {
                        push_u16(&mut body, 0); // start_pc
                        push_u16(&mut body, *line);
                    }
                }
                None => push_u16(&mut body, 0),
            }

            push_u16(&mut out, code);
            push_u32(&mut out, body.len() as u32);
            out.extend_from_slice(&body);
        }

        match source_file {
            Some((attr_name, value)) => {
                push_u16(&mut out, 1);
                push_u16(&mut out, attr_name);
                push_u32(&mut out, 2);
                push_u16(&mut out, value);
            }
            None => push_u16(&mut out, 0),
        }

        out
    }

    /// Writes `<dir>/<internal_name>.class`, creating package directories.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(format!("{}.class", self.internal_name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.build())?;
        Ok(path)
    }
}

struct Pool {
    bytes: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next_index: 1,
            utf8: HashMap::new(),
        }
    }
}

impl Pool {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        // Fixtures only use ASCII, which is identical in modified UTF-8.
        self.bytes.push(1);
        push_u16(&mut self.bytes, value.len() as u16);
        self.bytes.extend_from_slice(value.as_bytes());
        let index = self.take(1);
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn raw_utf8(&mut self, bytes: &[u8]) -> u16 {
        self.bytes.push(1);
        push_u16(&mut self.bytes, bytes.len() as u16);
        self.bytes.extend_from_slice(bytes);
        self.take(1)
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.bytes.push(7);
        push_u16(&mut self.bytes, name);
        self.take(1)
    }

    fn long(&mut self, value: u64) -> u16 {
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.take(2)
    }

    fn take(&mut self, slots: u16) -> u16 {
        let index = self.next_index;
        self.next_index += slots;
        index
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
