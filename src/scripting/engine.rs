// ============================================================================
// 引擎原语
// 标签读取、带显示名的求值、存活性与引用计数查询、异常翻译
// ============================================================================

use std::ffi::CString;
use std::ptr::NonNull;
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::function::{Rest, This};
use rquickjs::{qjs, Ctx, FromJs, Function, Object, Value};

use crate::core::{BindingError, BindingResult, JsError};
use crate::scripting::context::ContextInner;
use crate::scripting::flags::EvalFlags;
use crate::value::{convert, HostValue, Tag};

/// 对象渲染辅助函数在全局对象上的名称
pub(crate) const STRINGIFY_HELPER: &str = "__stringifyObject";

/// 读取引擎值的原始标签
pub(crate) fn raw_tag(value: &Value<'_>) -> i32 {
    let raw = value.as_raw();
    #[allow(unused_unsafe)]
    unsafe {
        qjs::JS_VALUE_GET_NORM_TAG(raw) as i32
    }
}

/// 堆单元头部的引用计数
///
/// # Safety
/// `raw` 的标签必须为负且该单元仍被持有。
pub(crate) unsafe fn ref_count(raw: qjs::JSValue) -> i32 {
    let header = qjs::JS_VALUE_GET_PTR(raw) as *const i32;
    *header
}

/// 堆单元地址，仅用于身份比较与诊断
pub(crate) fn heap_ptr(raw: qjs::JSValue) -> usize {
    #[allow(unused_unsafe)]
    unsafe {
        qjs::JS_VALUE_GET_PTR(raw) as usize
    }
}

/// 对象是否仍然存活（未被回收器标记为死亡）
///
/// # Safety
/// `ctx` 必须是仍然有效的上下文。
pub(crate) unsafe fn is_live_object(ctx: NonNull<qjs::JSContext>, raw: qjs::JSValue) -> bool {
    let rt = qjs::JS_GetRuntime(ctx.as_ptr());
    qjs::JS_IsLiveObject(rt, raw) as i32 != 0
}

/// 以指定显示名和标志求值
///
/// 模块定义对象归上下文所有，引擎不允许单独释放它，因此在包装之前就拒绝。
pub(crate) fn eval_raw<'js>(
    ctx: &Ctx<'js>,
    source: &str,
    display_name: &str,
    flags: EvalFlags,
) -> BindingResult<Value<'js>> {
    let input = CString::new(source).map_err(|e| BindingError::InvalidSource(e.to_string()))?;
    let filename =
        CString::new(display_name).map_err(|e| BindingError::InvalidSource(e.to_string()))?;

    let raw = unsafe {
        qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            input.as_ptr(),
            source.len() as _,
            filename.as_ptr(),
            flags.bits() as _,
        )
    };

    #[allow(unused_unsafe)]
    let tag = unsafe { qjs::JS_VALUE_GET_NORM_TAG(raw) } as i32;
    if tag == Tag::Module.raw() {
        return Err(BindingError::UnsupportedRepresentation(
            "compiled module definitions cannot be returned to the host".to_string(),
        ));
    }

    Ok(unsafe { Value::from_raw(ctx.clone(), raw) })
}

/// 把 rquickjs 的结果翻译为绑定层结果
///
/// 异常会从引擎中取出并转换为 [`JsError`]。
pub(crate) fn check<'js, T>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    result: rquickjs::Result<T>,
) -> BindingResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(rquickjs::Error::Exception) => Err(translate_exception(ctx, owner)),
        Err(rquickjs::Error::Allocation) => Err(BindingError::Resource(
            "engine allocation failed".to_string(),
        )),
        // 孤立代理项无法表示为 Rust 字符串
        Err(rquickjs::Error::Utf8(err)) => Err(BindingError::UnsupportedRepresentation(
            format!("string is not valid UTF-8: {}", err),
        )),
        Err(other) => Err(BindingError::engine(other)),
    }
}

/// 取出挂起的异常并转换
pub(crate) fn translate_exception<'js>(ctx: &Ctx<'js>, owner: &Rc<ContextInner>) -> BindingError {
    let exception = ctx.catch();

    let message = coerce_string(ctx, exception.clone())
        .unwrap_or_else(|_| "<exception could not be rendered>".to_string());
    let stack = exception
        .as_object()
        .and_then(|obj| obj.get::<_, Option<String>>("stack").ok().flatten());
    // 渲染失败时可能又挂起了新的异常
    let _ = ctx.catch();

    let value = convert::to_host(ctx, owner, exception, None).unwrap_or(HostValue::Undefined);

    tracing::debug!(target: "quickjs_bind::engine", %message, "Script raised an exception");
    BindingError::Exception(JsError::new(message, stack, value))
}

/// 按 `String(value)` 的规则转换为字符串
pub(crate) fn coerce_string<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    Coerced::<String>::from_js(ctx, value).map(|coerced| coerced.0)
}

/// 调用对象上的方法，`this` 为该对象
pub(crate) fn invoke_method<'js>(
    object: &Object<'js>,
    name: &str,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let method: Function<'js> = object.get(name)?;
    method.call((This(object.clone()), Rest(args)))
}

/// 使用预装的辅助函数把任意值渲染为字符串
pub(crate) fn stringify<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    let globals = ctx.globals();
    let helper: Function<'js> = globals.get(STRINGIFY_HELPER)?;
    let rendered: Value<'js> = helper.call((This(globals), value))?;
    coerce_string(ctx, rendered)
}
