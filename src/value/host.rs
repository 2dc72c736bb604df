//! 宿主侧值表示
//!
//! 基本类型按值复制；引擎中的堆对象以 [`WrappedValue`] / [`WrappedFunction`] 句柄出现，
//! 宿主函数以 [`HostFunction`] 出现，传入引擎时会生成一个可被脚本调用的函数。

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::core::{BindingError, BindingResult};
use crate::value::{WrappedFunction, WrappedValue};

/// 可以跨越宿主/引擎边界的值
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    BigInt(BigInt),
    /// 传入引擎时转换为新的数组
    List(Vec<HostValue>),
    /// 传入引擎时转换为新的普通对象
    Map(BTreeMap<String, HostValue>),
    /// 宿主函数，传入引擎时注册为可调用对象
    Function(HostFunction),
    /// 引擎对象或 Symbol 的句柄
    Object(WrappedValue),
    /// 引擎函数的句柄，调用时绑定到保存的接收者
    JsFunction(WrappedFunction),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::BigInt(_) => "bigint",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Function(_) => "host function",
            HostValue::Object(_) => "object",
            HostValue::JsFunction(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 整数值；没有小数部分的浮点数也视为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Float(f) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// 收窄为 `i64`；超出范围的 BigInt 返回 `Range`
    pub fn to_i64(&self) -> BindingResult<i64> {
        match self {
            HostValue::BigInt(b) => i64::try_from(b)
                .map_err(|_| BindingError::Range(format!("{} does not fit in i64", b))),
            other => other.as_i64().ok_or_else(|| {
                BindingError::UnsupportedRepresentation(format!(
                    "{} is not an integer",
                    other.type_name()
                ))
            }),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            HostValue::BigInt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, HostValue>> {
        match self {
            HostValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&WrappedValue> {
        match self {
            HostValue::Object(obj) => Some(obj),
            HostValue::JsFunction(func) => Some(func.as_value()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&WrappedFunction> {
        match self {
            HostValue::JsFunction(func) => Some(func),
            _ => None,
        }
    }

    /// 将句柄递归展开为宿主集合
    ///
    /// 数组变为 `List`，普通对象变为 `Map`，函数与 Symbol 保持为句柄。
    pub fn materialize(&self) -> BindingResult<HostValue> {
        match self {
            HostValue::Object(obj) => obj.materialize(),
            HostValue::List(items) => items
                .iter()
                .map(HostValue::materialize)
                .collect::<BindingResult<Vec<_>>>()
                .map(HostValue::List),
            HostValue::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.materialize()?)))
                .collect::<BindingResult<BTreeMap<_, _>>>()
                .map(HostValue::Map),
            other => Ok(other.clone()),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            // NaN 与自身相等，往返后的值才能比较
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            // 引擎可能把整数值的浮点数规范化为内联整数
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            (BigInt(a), Int(b)) | (Int(b), BigInt(a)) => *a == num_bigint::BigInt::from(*b),
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Function(a), Function(b)) => a.ptr_eq(b),
            (Object(a), Object(b)) => a.same_value(b),
            (JsFunction(a), JsFunction(b)) => a.as_value().same_value(b.as_value()),
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(v) => write!(f, "{}", v),
            HostValue::String(s) => f.write_str(s),
            HostValue::BigInt(b) => write!(f, "{}n", b),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            HostValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            }
            HostValue::Function(func) => {
                write!(f, "[host function {}]", func.name().unwrap_or("anonymous"))
            }
            HostValue::Object(obj) => write!(f, "{}", obj),
            HostValue::JsFunction(func) => write!(f, "{}", func.as_value()),
        }
    }
}

// --- From 实现 ---

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Undefined
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<BigInt> for HostValue {
    fn from(value: BigInt) -> Self {
        HostValue::BigInt(value)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<BTreeMap<String, T>> for HostValue {
    fn from(map: BTreeMap<String, T>) -> Self {
        HostValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

impl From<HostFunction> for HostValue {
    fn from(value: HostFunction) -> Self {
        HostValue::Function(value)
    }
}

impl From<WrappedValue> for HostValue {
    fn from(value: WrappedValue) -> Self {
        HostValue::Object(value)
    }
}

impl From<WrappedFunction> for HostValue {
    fn from(value: WrappedFunction) -> Self {
        HostValue::JsFunction(value)
    }
}

// ============================================================================
// 宿主函数
// ============================================================================

type HostFn = dyn Fn(&[HostValue]) -> BindingResult<HostValue>;

/// 可以暴露给脚本的宿主函数
///
/// `arity` 会成为引擎侧函数的 `length` 属性。
#[derive(Clone)]
pub struct HostFunction {
    name: Option<String>,
    arity: usize,
    func: Rc<HostFn>,
}

impl HostFunction {
    pub fn new<F>(arity: usize, func: F) -> Self
    where
        F: Fn(&[HostValue]) -> BindingResult<HostValue> + 'static,
    {
        Self {
            name: None,
            arity,
            func: Rc::new(func),
        }
    }

    /// 带名称的宿主函数，名称会出现在引擎的调用栈中
    pub fn named<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&[HostValue]) -> BindingResult<HostValue> + 'static,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(arity, func)
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn invoke(&self, args: &[HostValue]) -> BindingResult<HostValue> {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_equality() {
        assert_eq!(HostValue::Int(2), HostValue::Float(2.0));
        assert_ne!(HostValue::Int(2), HostValue::Float(2.5));
        assert_eq!(HostValue::BigInt(BigInt::from(7)), HostValue::Int(7));
    }

    #[test]
    fn test_nan_equals_nan() {
        assert_eq!(HostValue::Float(f64::NAN), HostValue::Float(f64::NAN));
        assert_eq!(
            HostValue::List(vec![HostValue::Float(f64::NAN)]),
            HostValue::List(vec![HostValue::Float(-f64::NAN)])
        );
        assert_ne!(HostValue::Float(f64::NAN), HostValue::Float(0.0));
        assert_ne!(HostValue::Float(f64::NAN), HostValue::Int(0));
    }

    #[test]
    fn test_to_i64_narrowing() {
        assert_eq!(HostValue::BigInt(BigInt::from(-9)).to_i64().unwrap(), -9);
        assert_eq!(HostValue::Float(4.0).to_i64().unwrap(), 4);
        let huge = HostValue::BigInt(BigInt::from(i64::MAX) + 1);
        assert!(matches!(huge.to_i64(), Err(BindingError::Range(_))));
        assert!(matches!(
            HostValue::from("x").to_i64(),
            Err(BindingError::UnsupportedRepresentation(_))
        ));
    }

    #[test]
    fn test_conversions_from_rust_types() {
        assert_eq!(HostValue::from(true), HostValue::Bool(true));
        assert_eq!(HostValue::from("x"), HostValue::String("x".to_string()));
        assert_eq!(HostValue::from(None::<i32>), HostValue::Null);
        assert_eq!(
            HostValue::from(vec![1, 2]),
            HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])
        );
    }

    #[test]
    fn test_host_function_invoke() {
        let add = HostFunction::named("add", 2, |args: &[HostValue]| {
            let a = args.first().and_then(HostValue::as_i64).unwrap_or(0);
            let b = args.get(1).and_then(HostValue::as_i64).unwrap_or(0);
            Ok(HostValue::Int(a + b))
        });
        assert_eq!(add.arity(), 2);
        assert_eq!(add.name(), Some("add"));
        assert_eq!(
            add.invoke(&[HostValue::Int(1), HostValue::Int(2)]).unwrap(),
            HostValue::Int(3)
        );
    }

    #[test]
    fn test_host_function_identity() {
        let f = HostFunction::new(0, |_| Ok(HostValue::Undefined));
        let g = HostFunction::new(0, |_| Ok(HostValue::Undefined));
        assert_eq!(HostValue::Function(f.clone()), HostValue::Function(f.clone()));
        assert_ne!(HostValue::Function(f), HostValue::Function(g));
    }

    #[test]
    fn test_host_function_error() {
        let fail = HostFunction::new(0, |_| Err(BindingError::Range("nope".to_string())));
        assert!(matches!(fail.invoke(&[]), Err(BindingError::Range(_))));
    }

    #[test]
    fn test_display() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), HostValue::List(vec![1.into(), "x".into()]));
        assert_eq!(HostValue::Map(map).to_string(), "{a: [1, x]}");
        assert_eq!(HostValue::BigInt(BigInt::from(5)).to_string(), "5n");
    }

    #[test]
    fn test_materialize_plain_values() {
        let value = HostValue::List(vec![HostValue::Null, HostValue::Float(1.5)]);
        assert_eq!(value.materialize().unwrap(), value);
    }
}
