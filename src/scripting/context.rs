// ============================================================================
// 执行上下文
// 求值、全局属性访问、包装值跟踪与确定性的销毁顺序
// ============================================================================

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rquickjs::{qjs, Ctx, Persistent, Value};
use tracing::{debug, info, trace, warn};

use crate::bindings::callable::{CallableId, CallableRegistry};
use crate::config::{ContextConfig, ConversionConfig};
use crate::core::{BindingError, BindingResult};
use crate::loader::ScriptLoader;
use crate::scripting::engine;
use crate::scripting::flags::EvalFlags;
use crate::scripting::handles;
use crate::scripting::prelude;
use crate::scripting::registry::{ValueId, ValueRegistry};
use crate::value::{convert, HostFunction, HostValue, ObjectKind, Tag, WrappedValue};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// 注册表中的一个被持有的引擎值
///
/// `raw` 是 `value` 的原始位模式副本，只要条目存在它就有效。
pub(crate) struct Entry {
    raw: qjs::JSValue,
    tag: Tag,
    value: Persistent<Value<'static>>,
    receiver: Option<Persistent<Value<'static>>>,
}

/// 运行时当前持有锁的 `Ctx`，由同一运行时的所有上下文共享
pub(crate) type ScopeSlot = Rc<Cell<Option<*const Ctx<'static>>>>;

/// 当前进入的引擎作用域
///
/// 宿主函数被引擎回调时，外层已经持有运行时锁，嵌套调用必须复用这把锁。
pub(crate) struct ActiveScope<'a> {
    slot: &'a Cell<Option<*const Ctx<'static>>>,
    previous: Option<*const Ctx<'static>>,
}

impl<'a> ActiveScope<'a> {
    fn enter<'js>(slot: &'a Cell<Option<*const Ctx<'static>>>, ctx: &Ctx<'js>) -> Self {
        let previous = slot.replace(Some(ctx as *const Ctx<'js> as *const Ctx<'static>));
        Self { slot, previous }
    }
}

impl Drop for ActiveScope<'_> {
    fn drop(&mut self) {
        self.slot.set(self.previous);
    }
}

pub(crate) struct ContextInner {
    id: u64,
    raw: RefCell<Option<rquickjs::Context>>,
    handle: NonNull<qjs::JSContext>,
    values: RefCell<ValueRegistry<Entry>>,
    callables: RefCell<CallableRegistry>,
    active: ScopeSlot,
    conversion: ConversionConfig,
    loader: Arc<Mutex<ScriptLoader>>,
    destroyed: Cell<bool>,
}

impl ContextInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn handle_key(&self) -> usize {
        self.handle.as_ptr() as usize
    }

    pub(crate) fn conversion(&self) -> ConversionConfig {
        self.conversion
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// 进入引擎作用域执行 `f`
    ///
    /// 运行时锁已被持有时不再加锁：同一上下文直接复用外层 `Ctx`，
    /// 兄弟上下文则从原始句柄构造自己的 `Ctx`。
    pub(crate) fn enter<R, F>(&self, f: F) -> BindingResult<R>
    where
        F: for<'js> FnOnce(&Ctx<'js>) -> BindingResult<R>,
    {
        if self.destroyed.get() {
            return Err(BindingError::Destroyed("context"));
        }
        if let Some(active) = self.active.get() {
            // SAFETY: 指针只在持有该 Ctx 的外层栈帧内有效，守卫离开时恢复
            let outer = unsafe { &*active };
            if outer.as_raw() == self.handle {
                return f(outer);
            }
            // SAFETY: 外层作用域持有同一运行时的锁，上下文尚未销毁
            let ctx = unsafe { Ctx::from_raw(self.handle) };
            let _scope = ActiveScope::enter(&self.active, &ctx);
            return f(&ctx);
        }

        let context = self
            .raw
            .borrow()
            .clone()
            .ok_or(BindingError::Destroyed("context"))?;
        context.with(|ctx| {
            let _scope = ActiveScope::enter(&self.active, &ctx);
            f(&ctx)
        })
    }

    /// 标记 `ctx` 为本上下文的当前作用域，用于引擎回调入口
    pub(crate) fn activate<'a, 'js>(&'a self, ctx: &Ctx<'js>) -> ActiveScope<'a> {
        ActiveScope::enter(&self.active, ctx)
    }

    // --- 包装值注册表 ---

    pub(crate) fn register<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: Value<'js>,
        receiver: Option<Value<'js>>,
        tag: Tag,
    ) -> ValueId {
        let entry = Entry {
            raw: value.as_raw(),
            tag,
            value: Persistent::save(ctx, value),
            receiver: receiver.map(|r| Persistent::save(ctx, r)),
        };
        let id = self.values.borrow_mut().insert(entry);
        trace!(target: "quickjs_bind::registry", context = self.id, ?id, %tag, "Registered value");
        id
    }

    /// 为同一个引擎值登记一个新的持有者
    pub(crate) fn duplicate(&self, id: ValueId) -> Option<ValueId> {
        if self.destroyed.get() {
            return None;
        }
        let entry = {
            let values = self.values.borrow();
            let entry = values.get(id)?;
            Entry {
                raw: entry.raw,
                tag: entry.tag,
                value: entry.value.clone(),
                receiver: entry.receiver.clone(),
            }
        };
        Some(self.values.borrow_mut().insert(entry))
    }

    /// 取出一个在本次作用域内有效的引用（连同接收者）
    pub(crate) fn restore<'js>(
        &self,
        ctx: &Ctx<'js>,
        id: ValueId,
    ) -> BindingResult<(Value<'js>, Option<Value<'js>>)> {
        let (value, receiver) = {
            let values = self.values.borrow();
            let entry = values.get(id).ok_or(BindingError::Released)?;
            (entry.value.clone(), entry.receiver.clone())
        };
        let value = value.restore(ctx).map_err(BindingError::engine)?;
        let receiver = match receiver {
            Some(receiver) => Some(receiver.restore(ctx).map_err(BindingError::engine)?),
            None => None,
        };
        Ok((value, receiver))
    }

    pub(crate) fn raw_of(&self, id: ValueId) -> Option<(qjs::JSValue, Tag)> {
        self.values.borrow().get(id).map(|entry| (entry.raw, entry.tag))
    }

    pub(crate) fn contains(&self, id: ValueId) -> bool {
        self.values.borrow().contains(id)
    }

    /// 当前持有的对象是否存活
    pub(crate) fn is_live(&self, id: ValueId) -> bool {
        if self.destroyed.get() {
            return false;
        }
        match self.raw_of(id) {
            // SAFETY: 条目持有引用，上下文尚未销毁
            Some((raw, Tag::Object)) => unsafe { engine::is_live_object(self.handle, raw) },
            Some(_) => true,
            None => false,
        }
    }

    /// 释放一个持有者，重复释放返回 `false`
    pub(crate) fn release(&self, id: ValueId) -> bool {
        let entry = self.values.borrow_mut().remove(id);
        let Some(entry) = entry else {
            return false;
        };

        if entry.tag == Tag::Object
            && !self.destroyed.get()
            && !unsafe { engine::is_live_object(self.handle, entry.raw) }
        {
            // 已经被回收的对象不能再减少引用计数
            warn!(
                target: "quickjs_bind::registry",
                context = self.id,
                ?id,
                "Skipping release of an object the collector already freed"
            );
            std::mem::forget(entry);
            return true;
        }

        drop(entry);
        trace!(target: "quickjs_bind::registry", context = self.id, ?id, "Released value");
        true
    }

    pub(crate) fn live_values(&self) -> usize {
        self.values.borrow().len()
    }

    // --- 宿主函数 ---

    pub(crate) fn register_callable(&self, function: HostFunction) -> CallableId {
        self.callables.borrow_mut().register(function)
    }

    pub(crate) fn callable(&self, id: CallableId) -> Option<HostFunction> {
        self.callables.borrow().get(id)
    }

    pub(crate) fn callable_count(&self) -> usize {
        self.callables.borrow().len()
    }

    /// 销毁顺序：包装值 -> 句柄映射 -> 宿主函数 -> 引擎上下文
    pub(crate) fn teardown(&self) {
        if self.destroyed.replace(true) {
            return;
        }

        let entries = self.values.borrow_mut().drain();
        let released = entries.len();
        drop(entries);

        handles::unregister(self.handle_key());

        let callables = self.callables.borrow_mut().clear();
        let callable_count = callables.len();
        drop(callables);

        let raw = self.raw.borrow_mut().take();
        drop(raw);

        debug!(
            target: "quickjs_bind::context",
            context = self.id,
            released,
            callables = callable_count,
            "Context destroyed"
        );
    }
}

/// 执行上下文
///
/// 由 [`Runtime::new_context`](crate::Runtime::new_context) 创建。上下文被丢弃或
/// 显式 [`free`](Context::free) 时，会先释放所有仍被宿主持有的包装值，
/// 之后这些句柄上的操作都返回 [`BindingError::Destroyed`]。
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    pub(crate) fn create(
        raw_rt: &rquickjs::Runtime,
        scope: ScopeSlot,
        context_config: &ContextConfig,
        conversion: ConversionConfig,
        loader: Arc<Mutex<ScriptLoader>>,
    ) -> BindingResult<Self> {
        let raw = rquickjs::Context::full(raw_rt)
            .map_err(|e| BindingError::Resource(e.to_string()))?;
        let handle = raw.with(|ctx| ctx.as_raw());

        let inner = Rc::new(ContextInner {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            raw: RefCell::new(Some(raw)),
            handle,
            values: RefCell::new(ValueRegistry::new()),
            callables: RefCell::new(CallableRegistry::new()),
            active: scope,
            conversion,
            loader,
            destroyed: Cell::new(false),
        });
        handles::register(inner.handle_key(), &inner);

        let context = Self { inner };
        prelude::install(&context.inner, context_config)?;

        info!(target: "quickjs_bind::context", context = context.inner.id, "Context created");
        Ok(context)
    }

    pub(crate) fn inner(&self) -> &Rc<ContextInner> {
        &self.inner
    }

    /// 上下文编号，仅用于日志与诊断
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// 引擎上下文的原始句柄
    pub fn raw_handle(&self) -> usize {
        self.inner.handle_key()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// 以显示名 `display_name` 求值源码
    pub fn eval(
        &self,
        source: &str,
        display_name: &str,
        flags: EvalFlags,
    ) -> BindingResult<HostValue> {
        let owner = &self.inner;
        owner.enter(|ctx| {
            let value = engine::eval_raw(ctx, source, display_name, flags)?;
            convert::to_host(ctx, owner, value, None)
        })
    }

    /// 以 `<input>` 为名求值全局脚本
    pub fn eval_script(&self, source: &str) -> BindingResult<HostValue> {
        self.eval(source, "<input>", EvalFlags::GLOBAL)
    }

    /// 以 `name` 为模块名求值 ES 模块
    pub fn eval_module(&self, source: &str, name: &str) -> BindingResult<HostValue> {
        self.eval(source, name, EvalFlags::MODULE)
    }

    /// 读取本地文件或下载远程脚本后求值
    pub fn load(&self, target: &str, flags: EvalFlags) -> BindingResult<HostValue> {
        let script = {
            let mut loader = self
                .inner
                .loader
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            loader.read_script(target)?
        };
        let name = script.path.to_string_lossy().into_owned();
        info!(
            target: "quickjs_bind::context",
            context = self.inner.id,
            script = %name,
            remote = script.is_remote(),
            "Loading script"
        );
        self.eval(&script.source, &name, flags)
    }

    /// 读取全局属性，函数值绑定到全局对象
    pub fn get(&self, name: &str) -> BindingResult<HostValue> {
        let owner = &self.inner;
        owner.enter(|ctx| {
            let globals = ctx.globals();
            let value: Value = engine::check(ctx, owner, globals.get(name))?;
            convert::to_host(ctx, owner, value, None)
        })
    }

    /// 设置全局属性
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> BindingResult<()> {
        let owner = &self.inner;
        let value = value.into();
        owner.enter(|ctx| {
            let engine_value = convert::to_engine(ctx, owner, &value)?;
            engine::check(ctx, owner, ctx.globals().set(name, engine_value))
        })
    }

    /// 调用全局函数 `name`
    pub fn call_global(&self, name: &str, args: &[HostValue]) -> BindingResult<HostValue> {
        match self.get(name)? {
            HostValue::JsFunction(function) => function.call(args),
            other => Err(BindingError::NotCallable(format!(
                "global '{}' is {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// 全局对象的句柄
    pub fn globals(&self) -> BindingResult<WrappedValue> {
        let owner = &self.inner;
        owner.enter(|ctx| {
            WrappedValue::register(owner, ctx, ctx.globals().into_value(), ObjectKind::Object)
        })
    }

    /// 把宿主函数注册为引擎函数并返回其句柄
    pub fn wrap_function(&self, function: HostFunction) -> BindingResult<HostValue> {
        let owner = &self.inner;
        owner.enter(|ctx| {
            let value = convert::to_engine(ctx, owner, &HostValue::Function(function))?;
            convert::to_host(ctx, owner, value, None)
        })
    }

    /// 宿主仍持有的包装值数量
    pub fn live_values(&self) -> usize {
        self.inner.live_values()
    }

    /// 已注册的宿主函数数量
    pub fn registered_callables(&self) -> usize {
        self.inner.callable_count()
    }

    /// 立即销毁上下文；可以重复调用
    pub fn free(&self) {
        self.inner.teardown();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("destroyed", &self.inner.is_destroyed())
            .field("live_values", &self.inner.live_values())
            .finish()
    }
}
