//! 宿主值与引擎值之间的转换
//!
//! 规则：
//! - 内联标签（整数、布尔、浮点、null、undefined）按值复制
//! - 字符串在两侧各自拥有一份拷贝
//! - 对象、数组、函数、Symbol 以包装句柄交给宿主，句柄持有一个引用
//! - 宿主集合传入引擎时总是生成新的数组或对象

use std::collections::BTreeMap;
use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt;
use rquickjs::{Array, Ctx, Function, Object, Value};

use crate::bindings::callable;
use crate::config::IntegerOverflow;
use crate::core::{BindingError, BindingResult};
use crate::scripting::context::ContextInner;
use crate::scripting::engine::{self, check};
use crate::value::{HostValue, ObjectKind, Tag, WrappedFunction, WrappedValue};

/// 可以被 Float64 精确表示的最大整数
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn mismatch(tag: Tag) -> BindingError {
    BindingError::Engine(format!("value does not match its {} tag", tag))
}

/// 引擎值转换为宿主值
///
/// `receiver` 是读取该值时所在的对象；函数值会绑定到它，缺省为全局对象。
pub(crate) fn to_host<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    value: Value<'js>,
    receiver: Option<&Value<'js>>,
) -> BindingResult<HostValue> {
    let tag = Tag::of(&value)?;
    match tag {
        Tag::Int => value
            .as_int()
            .map(|i| HostValue::Int(i.into()))
            .ok_or_else(|| mismatch(tag)),
        Tag::Float64 => value
            .as_float()
            .map(HostValue::Float)
            .ok_or_else(|| mismatch(tag)),
        Tag::Bool => value
            .as_bool()
            .map(HostValue::Bool)
            .ok_or_else(|| mismatch(tag)),
        Tag::Null => Ok(HostValue::Null),
        Tag::Undefined => Ok(HostValue::Undefined),
        Tag::String => {
            let string = value.as_string().ok_or_else(|| mismatch(tag))?;
            check(ctx, owner, string.to_string()).map(HostValue::String)
        }
        Tag::BigInt => {
            let digits = check(ctx, owner, engine::coerce_string(ctx, value))?;
            BigInt::from_str(&digits)
                .map(HostValue::BigInt)
                .map_err(|e| BindingError::UnsupportedRepresentation(format!("bigint {}: {}", digits, e)))
        }
        Tag::Symbol => {
            WrappedValue::register(owner, ctx, value, ObjectKind::Symbol).map(HostValue::Object)
        }
        Tag::Object => match ObjectKind::classify(&value) {
            ObjectKind::Function => {
                let receiver = receiver
                    .cloned()
                    .unwrap_or_else(|| ctx.globals().into_value());
                WrappedFunction::register(owner, ctx, value, receiver).map(HostValue::JsFunction)
            }
            kind => WrappedValue::register(owner, ctx, value, kind).map(HostValue::Object),
        },
        Tag::Exception => Err(engine::translate_exception(ctx, owner)),
        other => Err(BindingError::UnsupportedRepresentation(format!(
            "{} values cannot be passed to the host",
            other
        ))),
    }
}

/// 宿主值转换为引擎值
pub(crate) fn to_engine<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    value: &HostValue,
) -> BindingResult<Value<'js>> {
    match value {
        HostValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        HostValue::Null => Ok(Value::new_null(ctx.clone())),
        HostValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        HostValue::Int(i) => int_to_engine(ctx, owner, *i),
        HostValue::Float(f) => Ok(Value::new_float(ctx.clone(), *f)),
        HostValue::String(s) => {
            let string = check(ctx, owner, rquickjs::String::from_str(ctx.clone(), s))?;
            Ok(string.into_value())
        }
        HostValue::BigInt(b) => bigint_to_engine(ctx, owner, &b.to_string()),
        HostValue::List(items) => list_to_engine(ctx, owner, items),
        HostValue::Map(map) => map_to_engine(ctx, owner, map),
        HostValue::Function(function) => callable::create_engine_function(ctx, owner, function),
        HostValue::Object(handle) => handle.restore_in(ctx, owner),
        HostValue::JsFunction(function) => function.as_value().restore_in(ctx, owner),
    }
}

fn int_to_engine<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    value: i64,
) -> BindingResult<Value<'js>> {
    if let Ok(inline) = i32::try_from(value) {
        return Ok(Value::new_int(ctx.clone(), inline));
    }
    match owner.conversion().integer_overflow {
        IntegerOverflow::Strict => Err(BindingError::Range(format!(
            "{} does not fit in a 32-bit engine integer",
            value
        ))),
        IntegerOverflow::Widen if value.unsigned_abs() <= MAX_SAFE_INTEGER => {
            Ok(Value::new_float(ctx.clone(), value as f64))
        }
        IntegerOverflow::Widen => bigint_to_engine(ctx, owner, &value.to_string()),
    }
}

fn bigint_to_engine<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    digits: &str,
) -> BindingResult<Value<'js>> {
    let constructor: Function<'js> = check(ctx, owner, ctx.globals().get("BigInt"))?;
    check(ctx, owner, constructor.call((digits,)))
}

fn list_to_engine<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    items: &[HostValue],
) -> BindingResult<Value<'js>> {
    let array = check(ctx, owner, Array::new(ctx.clone()))?;
    for item in items {
        let element = to_engine(ctx, owner, item)?;
        // push 不接管参数，调用返回后参数引用随 Vec 一起释放
        check(ctx, owner, engine::invoke_method(&array, "push", vec![element]))?;
    }
    Ok(array.into_value())
}

fn map_to_engine<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    map: &BTreeMap<String, HostValue>,
) -> BindingResult<Value<'js>> {
    let object = check(ctx, owner, Object::new(ctx.clone()))?;
    for (key, item) in map {
        let element = to_engine(ctx, owner, item)?;
        // 属性写入接管 element 的引用
        check(ctx, owner, object.set(key.as_str(), element))?;
    }
    Ok(object.into_value())
}

/// 递归展开数组与普通对象
pub(crate) fn materialize<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    value: Value<'js>,
    depth: usize,
) -> BindingResult<HostValue> {
    if depth > owner.conversion().max_depth {
        return Err(BindingError::UnsupportedRepresentation(format!(
            "structure is nested deeper than {} levels (circular reference?)",
            owner.conversion().max_depth
        )));
    }
    if Tag::of(&value)? != Tag::Object || value.is_function() {
        return to_host(ctx, owner, value, None);
    }

    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for index in 0..array.len() {
            let item: Value<'js> = check(ctx, owner, array.get(index))?;
            items.push(materialize(ctx, owner, item, depth + 1)?);
        }
        return Ok(HostValue::List(items));
    }

    let object = value.as_object().ok_or_else(|| mismatch(Tag::Object))?;
    let mut map = BTreeMap::new();
    for key in object.keys::<String>() {
        let key = check(ctx, owner, key)?;
        let item: Value<'js> = check(ctx, owner, object.get(key.as_str()))?;
        let item = materialize(ctx, owner, item, depth + 1)?;
        map.insert(key, item);
    }
    Ok(HostValue::Map(map))
}
