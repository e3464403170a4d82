//! Attributes are name-tagged, length-prefixed payloads attached to a class,
//! field, method, or (recursively) another attribute. Recognized names
//! dispatch to a concrete payload; anything else is read-and-discarded so
//! sibling attributes stay aligned.

use crate::class::constant::ConstantPool;
use crate::error::{CoreError, CoreResult};
use crate::reader::BigEndianReader;

#[derive(Debug, Clone, Copy)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` means "any" (a `catch_type` of 0 in the class file).
    pub catch_type: Option<u16>,
}

impl ExceptionEntry {
    fn read(buffer: &mut BigEndianReader) -> CoreResult<Self> {
        let start_pc = buffer.read_u16()?;
        let end_pc = buffer.read_u16()?;
        let handler_pc = buffer.read_u16()?;
        let catch_type = match buffer.read_u16()? {
            0 => None,
            idx => Some(idx),
        };

        Ok(ExceptionEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    /// Raw bytecode; the interpreter dispatches opcodes lazily against it
    /// rather than this parser eagerly decoding an instruction list.
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionEntry>,
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    fn read(buffer: &mut BigEndianReader, pool: ConstantPool) -> CoreResult<Self> {
        let max_stack = buffer.read_u16()?;
        let max_locals = buffer.read_u16()?;

        let code_len = buffer.read_u32()?;
        let code = buffer.read_bytes(code_len as usize)?.to_vec();

        let exception_count = buffer.read_u16()?;
        let mut exceptions = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            exceptions.push(ExceptionEntry::read(buffer)?);
        }

        // Code's own sub-attributes (LineNumberTable, StackMapTable, ...)
        // resolve their names against the same pool as the enclosing class.
        let attributes = read_attributes(buffer, pool)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exceptions,
            attributes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    pub inner_info_index: u16,
    pub outer_info_index: u16,
    pub inner_name_index: u16,
    pub inner_access_flags: u16,
}

#[derive(Debug, Clone)]
pub enum Attribute {
    ConstantValue { const_index: u16 },
    Code(CodeAttribute),
    StackMapTable(Vec<u8>),
    Exceptions(Vec<u16>),
    InnerClasses(Vec<InnerClassEntry>),
    EnclosingMethod { class_index: u16, method_index: u16 },
    Synthetic,
    Signature { index: u16 },
    SourceFile { index: u16 },
    SourceDebugExtension(Vec<u8>),
    LineNumberTable(Vec<u8>),
    LocalVariableTable(Vec<u8>),
    RuntimeVisibleAnnotations(Vec<u8>),
    RuntimeInvisibleAnnotations(Vec<u8>),
    AnnotationDefault(Vec<u8>),
    BootstrapMethods(Vec<u8>),
    MethodParameters(Vec<u8>),
    Module(Vec<u8>),
    ModulePackages(Vec<u8>),
    ModuleMainClass { index: u16 },
    NestHost { host_class_index: u16 },
    NestMembers(Vec<u8>),
    Record(Vec<u8>),
    PermittedSubclasses(Vec<u8>),
    /// Unrecognized attribute name; body kept verbatim.
    Raw { name: String, body: Vec<u8> },
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::ConstantValue { .. } => "ConstantValue",
            Attribute::Code(..) => "Code",
            Attribute::StackMapTable(..) => "StackMapTable",
            Attribute::Exceptions(..) => "Exceptions",
            Attribute::InnerClasses(..) => "InnerClasses",
            Attribute::EnclosingMethod { .. } => "EnclosingMethod",
            Attribute::Synthetic => "Synthetic",
            Attribute::Signature { .. } => "Signature",
            Attribute::SourceFile { .. } => "SourceFile",
            Attribute::SourceDebugExtension(..) => "SourceDebugExtension",
            Attribute::LineNumberTable(..) => "LineNumberTable",
            Attribute::LocalVariableTable(..) => "LocalVariableTable",
            Attribute::RuntimeVisibleAnnotations(..) => "RuntimeVisibleAnnotations",
            Attribute::RuntimeInvisibleAnnotations(..) => "RuntimeInvisibleAnnotations",
            Attribute::AnnotationDefault(..) => "AnnotationDefault",
            Attribute::BootstrapMethods(..) => "BootstrapMethods",
            Attribute::MethodParameters(..) => "MethodParameters",
            Attribute::Module(..) => "Module",
            Attribute::ModulePackages(..) => "ModulePackages",
            Attribute::ModuleMainClass { .. } => "ModuleMainClass",
            Attribute::NestHost { .. } => "NestHost",
            Attribute::NestMembers(..) => "NestMembers",
            Attribute::Record(..) => "Record",
            Attribute::PermittedSubclasses(..) => "PermittedSubclasses",
            Attribute::Raw { name, .. } => name.as_str(),
        }
    }

    pub fn as_code(&self) -> Option<&CodeAttribute> {
        match self {
            Attribute::Code(c) => Some(c),
            _ => None,
        }
    }

    fn read_one(buffer: &mut BigEndianReader, pool: ConstantPool) -> CoreResult<Self> {
        let name_index = buffer.read_u16()?;
        let length = buffer.read_u32()?;
        let name = pool.resolve_string(name_index)?;

        // Every branch below must consume exactly `length` bytes so sibling
        // attributes stay aligned; we read the whole body up front and hand
        // out sub-readers, which enforces that invariant structurally.
        let body = buffer.read_bytes(length as usize)?.to_vec();
        let mut inner = BigEndianReader::new(&body);

        Ok(match name.as_str() {
            "ConstantValue" => Attribute::ConstantValue {
                const_index: inner.read_u16()?,
            },
            "Code" => Attribute::Code(CodeAttribute::read(&mut inner, pool)?),
            "StackMapTable" => Attribute::StackMapTable(body),
            "Exceptions" => {
                let count = inner.read_u16()?;
                let mut classes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    classes.push(inner.read_u16()?);
                }
                Attribute::Exceptions(classes)
            }
            "InnerClasses" => {
                let count = inner.read_u16()?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let inner_info_index = inner.read_u16()?;
                    let outer_info_index = inner.read_u16()?;
                    if outer_info_index != 0 && inner_info_index == outer_info_index {
                        return Err(CoreError::InvalidInnerClass {
                            inner: inner_info_index,
                            outer: outer_info_index,
                        });
                    }
                    entries.push(InnerClassEntry {
                        inner_info_index,
                        outer_info_index,
                        inner_name_index: inner.read_u16()?,
                        inner_access_flags: inner.read_u16()?,
                    });
                }
                Attribute::InnerClasses(entries)
            }
            "EnclosingMethod" => Attribute::EnclosingMethod {
                class_index: inner.read_u16()?,
                method_index: inner.read_u16()?,
            },
            "Synthetic" => Attribute::Synthetic,
            "Signature" => Attribute::Signature {
                index: inner.read_u16()?,
            },
            "SourceFile" => Attribute::SourceFile {
                index: inner.read_u16()?,
            },
            "SourceDebugExtension" => Attribute::SourceDebugExtension(body),
            "LineNumberTable" => Attribute::LineNumberTable(body),
            "LocalVariableTable" | "LocalVariableTypeTable" => Attribute::LocalVariableTable(body),
            "RuntimeVisibleAnnotations" => Attribute::RuntimeVisibleAnnotations(body),
            "RuntimeInvisibleAnnotations" => Attribute::RuntimeInvisibleAnnotations(body),
            "AnnotationDefault" => Attribute::AnnotationDefault(body),
            "BootstrapMethods" => Attribute::BootstrapMethods(body),
            "MethodParameters" => Attribute::MethodParameters(body),
            "Module" => Attribute::Module(body),
            "ModulePackages" => Attribute::ModulePackages(body),
            "ModuleMainClass" => Attribute::ModuleMainClass {
                index: inner.read_u16()?,
            },
            "NestHost" => Attribute::NestHost {
                host_class_index: inner.read_u16()?,
            },
            "NestMembers" => Attribute::NestMembers(body),
            "Record" => Attribute::Record(body),
            "PermittedSubclasses" => Attribute::PermittedSubclasses(body),
            _ => {
                warn!("Unknown attribute {:?}, storing raw body", &name);
                Attribute::Raw { name, body }
            }
        })
    }
}

/// Reads a `count`-prefixed attribute list shape shared by classes, fields,
/// methods, and `Code`, resolving attribute names against `pool`.
pub fn read_attributes(buffer: &mut BigEndianReader, pool: ConstantPool) -> CoreResult<Vec<Attribute>> {
    let count = buffer.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        attributes.push(Attribute::read_one(buffer, pool)?);
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::constant::Constant;

    fn name_pool() -> Vec<Constant> {
        vec![Constant::Utf8("SourceFile".to_string()), Constant::Utf8("InnerClasses".to_string())]
    }

    #[test]
    fn unknown_attribute_name_is_kept_raw_and_consumes_its_length() {
        let pool = vec![Constant::Utf8("Frobnicate".to_string())];
        let view = ConstantPool::new(&pool);

        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes()); // name_index -> "Frobnicate"
        buf.extend_from_slice(&3u32.to_be_bytes()); // length
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        buf.extend_from_slice(&9u8.to_be_bytes()); // trailing byte from a sibling attribute

        let mut reader = BigEndianReader::new(&buf);
        let attr = Attribute::read_one(&mut reader, view).unwrap();
        match attr {
            Attribute::Raw { name, body } => {
                assert_eq!(name, "Frobnicate");
                assert_eq!(body, vec![0xAA, 0xBB, 0xCC]);
            }
            other => panic!("expected Raw, got {:?}", other),
        }
        // cursor must sit exactly after the consumed body, ready for the sibling
        assert_eq!(reader.read_u8().unwrap(), 9);
    }

    #[test]
    fn source_file_attribute_decodes_its_index() {
        let pool = name_pool();
        let view = ConstantPool::new(&pool);

        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes()); // "SourceFile"
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&7u16.to_be_bytes());

        let mut reader = BigEndianReader::new(&buf);
        match Attribute::read_one(&mut reader, view).unwrap() {
            Attribute::SourceFile { index } => assert_eq!(index, 7),
            other => panic!("expected SourceFile, got {:?}", other),
        }
    }

    #[test]
    fn inner_classes_rejects_matching_inner_and_outer_index() {
        let pool = name_pool();
        let view = ConstantPool::new(&pool);

        let mut buf = Vec::new();
        buf.extend_from_slice(&2u16.to_be_bytes()); // "InnerClasses"
        buf.extend_from_slice(&10u32.to_be_bytes()); // length: count(2) + one entry(8)
        buf.extend_from_slice(&1u16.to_be_bytes()); // entry count
        buf.extend_from_slice(&5u16.to_be_bytes()); // inner_info_index
        buf.extend_from_slice(&5u16.to_be_bytes()); // outer_info_index (same as inner)
        buf.extend_from_slice(&0u16.to_be_bytes()); // inner_name_index
        buf.extend_from_slice(&0u16.to_be_bytes()); // inner_access_flags

        let mut reader = BigEndianReader::new(&buf);
        match Attribute::read_one(&mut reader, view) {
            Err(CoreError::InvalidInnerClass { inner: 5, outer: 5 }) => {}
            other => panic!("expected InvalidInnerClass, got {:?}", other),
        }
    }
}
