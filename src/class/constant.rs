//! The constant pool: a 1-indexed table of tagged entries. `Long`/`Double`
//! occupy two slots; the second slot is stored as an explicit placeholder so
//! 1-based indexing from the class file keeps working without an
//! indirection table.

use crate::error::{CoreError, CoreResult};
use crate::reader::BigEndianReader;

#[derive(Debug, Clone)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Fills the second slot after a `Long`/`Double` entry.
    Placeholder,
}

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

impl Constant {
    fn read_one(buffer: &mut BigEndianReader) -> CoreResult<Self> {
        let tag = buffer.read_u8()?;
        Ok(match tag {
            TAG_UTF8 => {
                let len = buffer.read_u16()?;
                let bytes = buffer.read_bytes(len as usize)?;
                Constant::Utf8(String::from_utf8_lossy(bytes).into_owned())
            }
            TAG_INTEGER => Constant::Integer(buffer.read_i32()?),
            TAG_FLOAT => Constant::Float(buffer.read_f32()?),
            TAG_LONG => Constant::Long(buffer.read_i64()?),
            TAG_DOUBLE => Constant::Double(buffer.read_f64()?),
            TAG_CLASS => Constant::Class {
                name_index: buffer.read_u16()?,
            },
            TAG_STRING => Constant::String {
                string_index: buffer.read_u16()?,
            },
            TAG_FIELD_REF => Constant::FieldRef {
                class_index: buffer.read_u16()?,
                name_and_type_index: buffer.read_u16()?,
            },
            TAG_METHOD_REF => Constant::MethodRef {
                class_index: buffer.read_u16()?,
                name_and_type_index: buffer.read_u16()?,
            },
            TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                class_index: buffer.read_u16()?,
                name_and_type_index: buffer.read_u16()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name_index: buffer.read_u16()?,
                descriptor_index: buffer.read_u16()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: buffer.read_u8()?,
                reference_index: buffer.read_u16()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType {
                descriptor_index: buffer.read_u16()?,
            },
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: buffer.read_u16()?,
                name_and_type_index: buffer.read_u16()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: buffer.read_u16()?,
                name_and_type_index: buffer.read_u16()?,
            },
            TAG_MODULE => Constant::Module {
                name_index: buffer.read_u16()?,
            },
            TAG_PACKAGE => Constant::Package {
                name_index: buffer.read_u16()?,
            },
            other => return Err(CoreError::ConstUnsupportedTag { tag: other }),
        })
    }

    /// Reads the `count`-prefixed pool of a class file: `count - 1` logical
    /// entries, where `Long`/`Double` each also push a `Placeholder`.
    pub fn read_pool(buffer: &mut BigEndianReader) -> CoreResult<Vec<Constant>> {
        let count = buffer.read_u16()?;
        let mut pool = Vec::with_capacity(count as usize);

        let mut index = 1u16;
        while index < count {
            let entry = Constant::read_one(buffer)?;
            trace!("\tconstant {}/{}: {:?}", index, count - 1, &entry);

            match &entry {
                Constant::Long(..) | Constant::Double(..) => {
                    pool.push(entry);
                    pool.push(Constant::Placeholder);
                    index += 2;
                }
                _ => {
                    pool.push(entry);
                    index += 1;
                }
            }
        }

        Ok(pool)
    }

    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Constant::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A thin view over the already-parsed constant vector providing the
/// recursive-resolution helpers the parser and interpreter both need.
#[repr(transparent)]
#[derive(Debug, Clone, Copy)]
pub struct ConstantPool<'a> {
    pool: &'a [Constant],
}

impl<'a> ConstantPool<'a> {
    pub fn new(pool: &'a [Constant]) -> Self {
        ConstantPool { pool }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn get(&self, index: u16) -> CoreResult<&'a Constant> {
        let idx = index
            .checked_sub(1)
            .ok_or(CoreError::ConstIndexOutOfBounds {
                index,
                len: self.pool.len(),
            })? as usize;

        self.pool
            .get(idx)
            .ok_or(CoreError::ConstIndexOutOfBounds {
                index,
                len: self.pool.len(),
            })
    }

    /// Resolves `index` to an owned UTF-8 string, following `Class` and
    /// `String` indirections down to a `Utf8` leaf. Bounded by the pool
    /// length so malformed cyclic input can't loop forever.
    pub fn resolve_string(&self, index: u16) -> CoreResult<String> {
        self.resolve_string_bounded(index, self.pool.len())
    }

    fn resolve_string_bounded(&self, index: u16, budget: usize) -> CoreResult<String> {
        if budget == 0 {
            return Err(CoreError::ConstStringNotFound { index });
        }

        match self.get(index)? {
            Constant::Utf8(s) => Ok(s.clone()),
            Constant::String { string_index } => {
                self.resolve_string_bounded(*string_index, budget - 1)
            }
            Constant::Class { name_index } => self.resolve_string_bounded(*name_index, budget - 1),
            _ => Err(CoreError::ConstStringNotFound { index }),
        }
    }

    pub fn class_name(&self, index: u16) -> CoreResult<String> {
        match self.get(index)? {
            Constant::Class { name_index } => self.resolve_string(*name_index),
            _ => Err(CoreError::ConstStringNotFound { index }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> CoreResult<(String, String)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.resolve_string(*name_index)?, self.resolve_string(*descriptor_index)?)),
            _ => Err(CoreError::ConstStringNotFound { index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_long_at_end() -> Vec<Constant> {
        // Class { name_index: 2 }, Utf8("A"), Long(7) + placeholder
        vec![
            Constant::Class { name_index: 2 },
            Constant::Utf8("A".to_string()),
            Constant::Long(7),
            Constant::Placeholder,
        ]
    }

    #[test]
    fn long_at_last_valid_index_still_resolves() {
        let pool = pool_with_long_at_end();
        let view = ConstantPool::new(&pool);
        assert_eq!(view.len(), 4);
        assert!(matches!(view.get(3).unwrap(), Constant::Long(7)));
        assert!(matches!(view.get(4).unwrap(), Constant::Placeholder));
    }

    #[test]
    fn resolve_string_follows_class_and_string_chains() {
        let pool = pool_with_long_at_end();
        let view = ConstantPool::new(&pool);
        assert_eq!(view.class_name(1).unwrap(), "A");
        assert_eq!(view.resolve_string(2).unwrap(), "A");
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let pool = pool_with_long_at_end();
        let view = ConstantPool::new(&pool);
        assert!(matches!(
            view.get(0),
            Err(CoreError::ConstIndexOutOfBounds { .. })
        ));
        assert!(matches!(
            view.get(5),
            Err(CoreError::ConstIndexOutOfBounds { .. })
        ));
    }
}
