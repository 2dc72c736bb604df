//! 引擎值标签
//!
//! 引擎值的标签决定了它是内联存储（整数、布尔、浮点等）还是指向带引用计数的堆对象。
//! 负数标签都是堆对象，其首个字段是引用计数。

use std::fmt;

use rquickjs::Value;

use crate::core::{BindingError, BindingResult};
use crate::scripting::engine;

/// 引擎值的类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Tag {
    BigDecimal = -11,
    BigInt = -10,
    BigFloat = -9,
    Symbol = -8,
    String = -7,
    Module = -3,
    FunctionBytecode = -2,
    Object = -1,
    Int = 0,
    Bool = 1,
    Null = 2,
    Undefined = 3,
    Uninitialized = 4,
    CatchOffset = 5,
    Exception = 6,
    Float64 = 7,
}

impl Tag {
    /// 从原始标签值解析
    pub fn from_raw(raw: i32) -> BindingResult<Self> {
        let tag = match raw {
            -11 => Tag::BigDecimal,
            -10 => Tag::BigInt,
            -9 => Tag::BigFloat,
            -8 => Tag::Symbol,
            -7 => Tag::String,
            -3 => Tag::Module,
            -2 => Tag::FunctionBytecode,
            -1 => Tag::Object,
            0 => Tag::Int,
            1 => Tag::Bool,
            2 => Tag::Null,
            3 => Tag::Undefined,
            4 => Tag::Uninitialized,
            5 => Tag::CatchOffset,
            6 => Tag::Exception,
            7 => Tag::Float64,
            other => {
                return Err(BindingError::UnsupportedRepresentation(format!(
                    "unknown value tag {}",
                    other
                )))
            }
        };
        Ok(tag)
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// 标签为负的值指向带引用计数的堆单元
    pub fn has_ref_count(self) -> bool {
        self.raw() < 0
    }

    /// 引擎内部使用、不会出现在脚本可见值上的标签
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            Tag::Module | Tag::FunctionBytecode | Tag::Uninitialized | Tag::CatchOffset
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::BigDecimal => "BigDecimal",
            Tag::BigInt => "BigInt",
            Tag::BigFloat => "BigFloat",
            Tag::Symbol => "Symbol",
            Tag::String => "String",
            Tag::Module => "Module",
            Tag::FunctionBytecode => "FunctionBytecode",
            Tag::Object => "Object",
            Tag::Int => "Int",
            Tag::Bool => "Bool",
            Tag::Null => "Null",
            Tag::Undefined => "Undefined",
            Tag::Uninitialized => "Uninitialized",
            Tag::CatchOffset => "CatchOffset",
            Tag::Exception => "Exception",
            Tag::Float64 => "Float64",
        }
    }

    /// 读取引擎值的标签
    pub(crate) fn of(value: &Value<'_>) -> BindingResult<Self> {
        Self::from_raw(engine::raw_tag(value))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 被包装的堆对象的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Object,
    Array,
    Function,
    Symbol,
}

impl ObjectKind {
    pub(crate) fn classify(value: &Value<'_>) -> Self {
        if value.is_symbol() {
            ObjectKind::Symbol
        } else if value.is_function() {
            ObjectKind::Function
        } else if value.is_array() {
            ObjectKind::Array
        } else {
            ObjectKind::Object
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::qjs;

    const ALL: [Tag; 16] = [
        Tag::BigDecimal,
        Tag::BigInt,
        Tag::BigFloat,
        Tag::Symbol,
        Tag::String,
        Tag::Module,
        Tag::FunctionBytecode,
        Tag::Object,
        Tag::Int,
        Tag::Bool,
        Tag::Null,
        Tag::Undefined,
        Tag::Uninitialized,
        Tag::CatchOffset,
        Tag::Exception,
        Tag::Float64,
    ];

    #[test]
    fn test_raw_round_trip() {
        for tag in ALL {
            assert_eq!(Tag::from_raw(tag.raw()).unwrap(), tag);
        }
    }

    #[test]
    fn test_unknown_tags_rejected() {
        for raw in [-12, -6, -5, -4, 8, 100] {
            assert!(matches!(
                Tag::from_raw(raw),
                Err(BindingError::UnsupportedRepresentation(_))
            ));
        }
    }

    #[test]
    fn test_ref_counted_tags_are_negative() {
        assert!(Tag::Object.has_ref_count());
        assert!(Tag::String.has_ref_count());
        assert!(Tag::BigInt.has_ref_count());
        assert!(!Tag::Int.has_ref_count());
        assert!(!Tag::Float64.has_ref_count());
        assert!(!Tag::Undefined.has_ref_count());
    }

    #[test]
    fn test_layout_matches_engine_headers() {
        assert_eq!(Tag::Int.raw(), qjs::JS_TAG_INT as i32);
        assert_eq!(Tag::Object.raw(), qjs::JS_TAG_OBJECT as i32);
        assert_eq!(Tag::String.raw(), qjs::JS_TAG_STRING as i32);
        assert_eq!(Tag::Float64.raw(), qjs::JS_TAG_FLOAT64 as i32);
        assert_eq!(Tag::Undefined.raw(), qjs::JS_TAG_UNDEFINED as i32);
    }

    #[test]
    fn test_internal_tags() {
        assert!(Tag::Module.is_internal());
        assert!(Tag::FunctionBytecode.is_internal());
        assert!(!Tag::Object.is_internal());
    }
}
