//! 引擎堆对象的宿主句柄
//!
//! 每个 [`WrappedValue`] 在所属上下文的注册表中占一个槽位，槽位持有一个引用。
//! 克隆句柄会登记新的引用；丢弃或 [`release`](WrappedValue::release) 会归还它。
//! 上下文销毁后，句柄上的操作返回 [`BindingError::Destroyed`]。

use std::fmt;
use std::rc::{Rc, Weak};

use rquickjs::{Ctx, Value};

use crate::bindings::proxy;
use crate::core::{BindingError, BindingResult};
use crate::scripting::context::ContextInner;
use crate::scripting::engine::{self, check};
use crate::scripting::registry::ValueId;
use crate::value::{convert, HostValue, ObjectKind, Tag};

/// 引擎对象、数组或 Symbol 的句柄
pub struct WrappedValue {
    owner: Weak<ContextInner>,
    id: ValueId,
    kind: ObjectKind,
    tag: Tag,
}

impl WrappedValue {
    pub(crate) fn register<'js>(
        owner: &Rc<ContextInner>,
        ctx: &Ctx<'js>,
        value: Value<'js>,
        kind: ObjectKind,
    ) -> BindingResult<Self> {
        Self::register_with_receiver(owner, ctx, value, None, kind)
    }

    fn register_with_receiver<'js>(
        owner: &Rc<ContextInner>,
        ctx: &Ctx<'js>,
        value: Value<'js>,
        receiver: Option<Value<'js>>,
        kind: ObjectKind,
    ) -> BindingResult<Self> {
        let tag = Tag::of(&value)?;
        if !tag.has_ref_count() {
            return Err(BindingError::UnsupportedRepresentation(format!(
                "{} values are copied, not wrapped",
                tag
            )));
        }
        let id = owner.register(ctx, value, receiver, tag);
        Ok(Self {
            owner: Rc::downgrade(owner),
            id,
            kind,
            tag,
        })
    }

    pub(crate) fn owner(&self) -> BindingResult<Rc<ContextInner>> {
        let owner = self
            .owner
            .upgrade()
            .ok_or(BindingError::Destroyed("context"))?;
        if owner.is_destroyed() {
            return Err(BindingError::Destroyed("context"));
        }
        Ok(owner)
    }

    pub(crate) fn id(&self) -> ValueId {
        self.id
    }

    /// 在 `owner` 的作用域内取出一个引用；句柄必须属于 `owner`
    pub(crate) fn restore_in<'js>(
        &self,
        ctx: &Ctx<'js>,
        owner: &Rc<ContextInner>,
    ) -> BindingResult<Value<'js>> {
        let mine = self.owner()?;
        if !Rc::ptr_eq(&mine, owner) {
            return Err(BindingError::ForeignContext);
        }
        owner.restore(ctx, self.id).map(|(value, _)| value)
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_array(&self) -> bool {
        self.kind == ObjectKind::Array
    }

    /// 句柄是否已经释放（显式释放或上下文已销毁）
    pub fn is_released(&self) -> bool {
        self.owner
            .upgrade()
            .map_or(true, |owner| !owner.contains(self.id))
    }

    /// 引擎是否仍认为该对象存活
    pub fn is_live(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.is_live(self.id))
    }

    /// 引擎中的引用计数，包含本句柄持有的那一个
    pub fn ref_count(&self) -> BindingResult<i32> {
        let owner = self.owner()?;
        let (raw, tag) = owner.raw_of(self.id).ok_or(BindingError::Released)?;
        if !tag.has_ref_count() {
            return Err(BindingError::UnsupportedRepresentation(format!(
                "{} values are not reference counted",
                tag
            )));
        }
        // SAFETY: 条目持有引用，堆单元在读取期间有效
        Ok(unsafe { engine::ref_count(raw) })
    }

    /// 读取属性；函数属性绑定到本对象
    pub fn get(&self, key: &str) -> BindingResult<HostValue> {
        let owner = self.owner()?;
        owner.enter(|ctx| {
            let (value, _) = owner.restore(ctx, self.id)?;
            let object = value.as_object().ok_or_else(|| {
                BindingError::UnsupportedRepresentation(format!("{} has no properties", self.tag))
            })?;
            let property: Value = check(ctx, &owner, object.get(key))?;
            convert::to_host(ctx, &owner, property, Some(&value))
        })
    }

    /// 设置属性
    pub fn set(&self, key: &str, value: impl Into<HostValue>) -> BindingResult<()> {
        let owner = self.owner()?;
        let value = value.into();
        owner.enter(|ctx| {
            let (target, _) = owner.restore(ctx, self.id)?;
            let object = target.as_object().ok_or_else(|| {
                BindingError::UnsupportedRepresentation(format!("{} has no properties", self.tag))
            })?;
            let engine_value = convert::to_engine(ctx, &owner, &value)?;
            check(ctx, &owner, object.set(key, engine_value))
        })
    }

    /// 数组长度；非数组返回 `None`
    pub fn len(&self) -> BindingResult<Option<usize>> {
        if !self.is_array() {
            return Ok(None);
        }
        let owner = self.owner()?;
        owner.enter(|ctx| {
            let (value, _) = owner.restore(ctx, self.id)?;
            Ok(value.as_array().map(|array| array.len()))
        })
    }

    /// 递归复制为宿主集合
    pub fn materialize(&self) -> BindingResult<HostValue> {
        let owner = self.owner()?;
        owner.enter(|ctx| {
            let (value, _) = owner.restore(ctx, self.id)?;
            convert::materialize(ctx, &owner, value, 0)
        })
    }

    /// 可读的字符串形式（循环引用显示为 `[Circular]`）
    pub fn stringify(&self) -> BindingResult<String> {
        let owner = self.owner()?;
        owner.enter(|ctx| {
            let (value, _) = owner.restore(ctx, self.id)?;
            check(ctx, &owner, engine::stringify(ctx, value))
        })
    }

    /// 立即归还引用；重复调用返回 `false`
    pub fn release(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.release(self.id))
    }

    /// 是否指向同一个引擎堆单元
    pub fn same_value(&self, other: &WrappedValue) -> bool {
        match (self.heap_ptr(), other.heap_ptr()) {
            (Some(a), Some(b)) => a == b && Weak::ptr_eq(&self.owner, &other.owner),
            _ => false,
        }
    }

    fn heap_ptr(&self) -> Option<usize> {
        let owner = self.owner.upgrade()?;
        owner.raw_of(self.id).map(|(raw, _)| engine::heap_ptr(raw))
    }
}

impl Clone for WrappedValue {
    fn clone(&self) -> Self {
        let id = self
            .owner
            .upgrade()
            .and_then(|owner| owner.duplicate(self.id))
            .unwrap_or(self.id);
        Self {
            owner: self.owner.clone(),
            id,
            kind: self.kind,
            tag: self.tag,
        }
    }
}

impl Drop for WrappedValue {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for WrappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stringify() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<released>"),
        }
    }
}

impl fmt::Debug for WrappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ptr = self.heap_ptr().unwrap_or(0);
        match self.ref_count() {
            Ok(count) => write!(
                f,
                "<JSObject tag={} ptr={:#x} ref_count={} val={}>",
                self.tag, ptr, count, self
            ),
            Err(_) => write!(f, "<JSObject tag={} released>", self.tag),
        }
    }
}

// ============================================================================
// 函数句柄
// ============================================================================

/// 引擎函数的句柄
///
/// 与函数一起保存了读取它时的接收者，调用时作为 `this`。
pub struct WrappedFunction {
    inner: WrappedValue,
}

impl WrappedFunction {
    pub(crate) fn register<'js>(
        owner: &Rc<ContextInner>,
        ctx: &Ctx<'js>,
        function: Value<'js>,
        receiver: Value<'js>,
    ) -> BindingResult<Self> {
        let inner = WrappedValue::register_with_receiver(
            owner,
            ctx,
            function,
            Some(receiver),
            ObjectKind::Function,
        )?;
        Ok(Self { inner })
    }

    /// 以保存的接收者调用
    pub fn call(&self, args: &[HostValue]) -> BindingResult<HostValue> {
        proxy::call_function(self, args)
    }

    /// 同一个函数绑定到新的接收者
    pub fn bind(&self, receiver: &HostValue) -> BindingResult<WrappedFunction> {
        let owner = self.inner.owner()?;
        owner.enter(|ctx| {
            let (function, _) = owner.restore(ctx, self.inner.id())?;
            let receiver = convert::to_engine(ctx, &owner, receiver)?;
            WrappedFunction::register(&owner, ctx, function, receiver)
        })
    }

    /// 声明的形参个数（`length` 属性）
    pub fn arity(&self) -> BindingResult<usize> {
        match self.inner.get("length")? {
            HostValue::Int(n) if n >= 0 => Ok(n as usize),
            other => Err(BindingError::UnsupportedRepresentation(format!(
                "function length is {}",
                other.type_name()
            ))),
        }
    }

    /// 函数名（`name` 属性）
    pub fn name(&self) -> BindingResult<String> {
        match self.inner.get("name")? {
            HostValue::String(name) => Ok(name),
            _ => Ok(String::new()),
        }
    }

    pub fn as_value(&self) -> &WrappedValue {
        &self.inner
    }

    pub fn release(&self) -> bool {
        self.inner.release()
    }
}

impl Clone for WrappedFunction {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for WrappedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WrappedFunction").field(&self.inner).finish()
    }
}
