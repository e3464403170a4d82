//! The class-file parser: magic/version check, constant pool, access flags,
//! fields, methods, and their attributes.

pub mod attribute;
pub mod constant;

use crate::class::attribute::{read_attributes, Attribute, CodeAttribute};
use crate::class::constant::{Constant, ConstantPool};
use crate::error::{CoreError, CoreResult};
use crate::reader::{BigEndianReader, ByteCursor};

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

bitflags! {
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl FieldInfo {
    fn read(buffer: &mut BigEndianReader, pool: ConstantPool) -> CoreResult<Self> {
        let access = AccessFlags::from_bits_truncate(buffer.read_u16()?);
        let name_index = buffer.read_u16()?;
        let descriptor_index = buffer.read_u16()?;
        let attributes = read_attributes(buffer, pool)?;

        Ok(FieldInfo {
            access,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn name(&self, pool: ConstantPool) -> CoreResult<String> {
        pool.resolve_string(self.name_index)
    }

    pub fn descriptor(&self, pool: ConstantPool) -> CoreResult<String> {
        pool.resolve_string(self.descriptor_index)
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    fn read(buffer: &mut BigEndianReader, pool: ConstantPool) -> CoreResult<Self> {
        let access = AccessFlags::from_bits_truncate(buffer.read_u16()?);
        let name_index = buffer.read_u16()?;
        let descriptor_index = buffer.read_u16()?;
        let attributes = read_attributes(buffer, pool)?;

        Ok(MethodInfo {
            access,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn name(&self, pool: ConstantPool) -> CoreResult<String> {
        pool.resolve_string(self.name_index)
    }

    pub fn descriptor(&self, pool: ConstantPool) -> CoreResult<String> {
        pool.resolve_string(self.descriptor_index)
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(Attribute::as_code)
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    pub minor_version: u16,
    pub major_version: u16,
    pub constants: Vec<Constant>,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

impl Class {
    pub fn constants(&self) -> ConstantPool {
        ConstantPool::new(&self.constants)
    }

    pub fn parse(data: &[u8]) -> CoreResult<Self> {
        let len = data.len();
        trace!("A total of {} bytes found!", len);

        let mut buffer = BigEndianReader::new(data);

        let magic = buffer.read_u32()?;
        if magic != CLASS_MAGIC {
            return Err(CoreError::BadMagic { found: magic });
        }
        trace!("Magic number matches: {:#010x}", magic);

        let minor_version = buffer.read_u16()?;
        let major_version = buffer.read_u16()?;
        trace!("Class version: {}.{}", major_version, minor_version);

        let constants = Constant::read_pool(&mut buffer)?;
        trace!("Read {} constant pool entr(ies)", constants.len());
        let pool = ConstantPool::new(&constants);

        let access_flags = AccessFlags::from_bits_truncate(buffer.read_u16()?);
        trace!("Access flags: {:?}", access_flags);

        let this_class = buffer.read_u16()?;
        let super_class = buffer.read_u16()?;

        let interface_count = buffer.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(buffer.read_u16()?);
        }
        trace!("Read {} interface(s)", interfaces.len());

        let field_count = buffer.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(FieldInfo::read(&mut buffer, pool)?);
        }
        trace!("Read {} field(s)", fields.len());

        let method_count = buffer.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MethodInfo::read(&mut buffer, pool)?);
        }
        trace!("Read {} method(s)", methods.len());

        let attributes = read_attributes(&mut buffer, pool)?;
        trace!("Read {} class attribute(s)", attributes.len());

        debug!("Loaded class {:?}, {} bytes remaining", this_class, buffer.remaining().len());

        Ok(Class {
            minor_version,
            major_version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn name(&self) -> CoreResult<String> {
        self.constants().class_name(self.this_class)
    }

    pub fn super_class_name(&self) -> CoreResult<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.constants().class_name(self.super_class)?))
    }

    pub fn interface_names(&self) -> CoreResult<Vec<String>> {
        let pool = self.constants();
        self.interfaces.iter().map(|&idx| pool.class_name(idx)).collect()
    }

    /// Every distinct class name this class's constant pool refers to,
    /// excluding itself. A cheap, non-transitive projection used for
    /// dependency inspection, not for driving class loading.
    pub fn dependencies(&self) -> Vec<String> {
        let pool = self.constants();
        let mut names = Vec::new();

        for constant in &self.constants {
            if let Constant::Class { name_index } = constant {
                if *name_index == self.this_class {
                    continue;
                }
                if let Ok(name) = pool.resolve_string(*name_index) {
                    names.push(name);
                }
            }
        }

        names
    }

    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        let pool = self.constants();
        self.methods.iter().find(|m| {
            m.name(pool).as_deref() == Ok(name) && m.descriptor(pool).as_deref() == Ok(descriptor)
        })
    }

    pub fn get_field(&self, name: &str, descriptor: &str) -> Option<&FieldInfo> {
        let pool = self.constants();
        self.fields.iter().find(|f| {
            f.name(pool).as_deref() == Ok(name) && f.descriptor(pool).as_deref() == Ok(descriptor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled minimal class file: no fields, one `<init>` method
    /// with an empty `Code` attribute, no superclass dependency resolution
    /// attempted. Mirrors the shape `javac` emits for `class Empty {}`
    /// minus its actual bytecode, which isn't needed to exercise the parser.
    fn minimal_class_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major (Java 8)

        // constant pool: count = 3 (entries 1..=2)
        out.extend_from_slice(&3u16.to_be_bytes());
        // #1 Utf8 "Empty"
        out.push(1);
        out.extend_from_slice(&5u16.to_be_bytes());
        out.extend_from_slice(b"Empty");
        // #2 Class -> #1
        out.push(7);
        out.extend_from_slice(&1u16.to_be_bytes());

        out.extend_from_slice(&0x0021u16.to_be_bytes()); // access: PUBLIC|SUPER
        out.extend_from_slice(&2u16.to_be_bytes()); // this_class = #2
        out.extend_from_slice(&0u16.to_be_bytes()); // super_class = none
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces count
        out.extend_from_slice(&0u16.to_be_bytes()); // fields count
        out.extend_from_slice(&0u16.to_be_bytes()); // methods count
        out.extend_from_slice(&0u16.to_be_bytes()); // attributes count

        out
    }

    #[test]
    fn parses_minimal_class_and_resolves_name() {
        let bytes = minimal_class_bytes();
        let class = Class::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "Empty");
        assert_eq!(class.super_class_name().unwrap(), None);
        assert!(class.methods.is_empty());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = minimal_class_bytes();
        bytes[0] = 0;
        match Class::parse(&bytes) {
            Err(CoreError::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }
}
