// ============================================================================
// 引擎运行时
// 持有堆与回收器，创建上下文，销毁时先销毁所有子上下文
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex};

use rquickjs::loader::ScriptLoader as FileModuleLoader;
use tracing::{debug, info};

use crate::config::BindingConfig;
use crate::core::{BindingError, BindingResult};
use crate::loader::{builtin_resolver, BuiltinModules, ModuleResolver, ScriptLoader};
use crate::scripting::context::{Context, ContextInner, ScopeSlot};

/// 运行时内存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// 已分配的字节数
    pub malloc_size: i64,
    /// 内存上限
    pub malloc_limit: i64,
    /// 存活的对象数
    pub obj_count: i64,
    /// 字符串与 Symbol 等原子的数量
    pub atom_count: i64,
    /// 字符串数量
    pub str_count: i64,
}

struct RuntimeInner {
    raw: RefCell<Option<rquickjs::Runtime>>,
    contexts: RefCell<Vec<Weak<ContextInner>>>,
    scope: ScopeSlot,
    loader: Arc<Mutex<ScriptLoader>>,
    config: BindingConfig,
    destroyed: Cell<bool>,
}

/// 引擎运行时
///
/// 运行时被丢弃或 [`free`](Runtime::free) 时，所有由它创建且仍然存活的上下文
/// 会先按上下文的销毁顺序被销毁。
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// 使用默认配置创建运行时
    pub fn new() -> BindingResult<Self> {
        Self::with_config(BindingConfig::default())
    }

    pub fn with_config(config: BindingConfig) -> BindingResult<Self> {
        config.validate()?;

        let raw = rquickjs::Runtime::new().map_err(|e| BindingError::Resource(e.to_string()))?;
        if let Some(limit) = config.runtime.memory_limit {
            raw.set_memory_limit(limit);
        }
        if let Some(size) = config.runtime.max_stack_size {
            raw.set_max_stack_size(size);
        }
        if let Some(threshold) = config.runtime.gc_threshold {
            raw.set_gc_threshold(threshold);
        }

        let loader = Arc::new(Mutex::new(ScriptLoader::new(config.loader.clone())));
        raw.set_loader(
            (builtin_resolver(), ModuleResolver::new(Arc::clone(&loader))),
            (BuiltinModules, FileModuleLoader::default().with_extension("mjs")),
        );

        info!(
            target: "quickjs_bind::runtime",
            memory_limit = ?config.runtime.memory_limit,
            overflow = ?config.conversion.integer_overflow,
            "Runtime created"
        );

        Ok(Self {
            inner: Rc::new(RuntimeInner {
                raw: RefCell::new(Some(raw)),
                contexts: RefCell::new(Vec::new()),
                scope: Rc::new(Cell::new(None)),
                loader,
                config,
                destroyed: Cell::new(false),
            }),
        })
    }

    /// 创建新的执行上下文
    pub fn new_context(&self) -> BindingResult<Context> {
        let raw = self.raw("create a context")?;
        let context = Context::create(
            &raw,
            Rc::clone(&self.inner.scope),
            &self.inner.config.context,
            self.inner.config.conversion,
            Arc::clone(&self.inner.loader),
        )?;

        let mut contexts = self.inner.contexts.borrow_mut();
        contexts.retain(|c| c.strong_count() > 0);
        contexts.push(Rc::downgrade(context.inner()));
        Ok(context)
    }

    pub fn config(&self) -> &BindingConfig {
        &self.inner.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// 尚未销毁的子上下文数量
    pub fn live_contexts(&self) -> usize {
        self.inner
            .contexts
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|c| !c.is_destroyed())
            .count()
    }

    /// 立即运行一次垃圾回收
    pub fn run_gc(&self) -> BindingResult<()> {
        let raw = self.raw("collect garbage")?;
        raw.run_gc();
        Ok(())
    }

    pub fn set_memory_limit(&self, limit: usize) -> BindingResult<()> {
        self.raw("change limits")?.set_memory_limit(limit);
        Ok(())
    }

    pub fn memory_usage(&self) -> BindingResult<MemoryStats> {
        let usage = self.raw("report memory usage")?.memory_usage();
        Ok(MemoryStats {
            malloc_size: usage.malloc_size as i64,
            malloc_limit: usage.malloc_limit as i64,
            obj_count: usage.obj_count as i64,
            atom_count: usage.atom_count as i64,
            str_count: usage.str_count as i64,
        })
    }

    /// 销毁所有子上下文后释放引擎运行时；可以重复调用
    pub fn free(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }

        let children = std::mem::take(&mut *self.inner.contexts.borrow_mut());
        let mut destroyed = 0usize;
        for child in children.iter().filter_map(Weak::upgrade) {
            if !child.is_destroyed() {
                destroyed += 1;
            }
            child.teardown();
        }

        let raw = self.inner.raw.borrow_mut().take();
        drop(raw);
        debug!(target: "quickjs_bind::runtime", contexts = destroyed, "Runtime destroyed");
    }

    /// 引擎运行时句柄；脚本执行期间运行时锁已被占用，返回 `Busy`
    fn raw(&self, action: &'static str) -> BindingResult<rquickjs::Runtime> {
        if self.inner.scope.get().is_some() {
            return Err(BindingError::Busy(action));
        }
        self.inner
            .raw
            .borrow()
            .clone()
            .ok_or(BindingError::Destroyed("runtime"))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("destroyed", &self.is_destroyed())
            .field("live_contexts", &self.live_contexts())
            .finish()
    }
}
