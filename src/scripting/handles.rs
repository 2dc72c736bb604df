//! 引擎上下文句柄到宿主上下文的映射
//!
//! 引擎回调（宿主函数调用、模块解析）只携带原始上下文指针，
//! 通过这张表找回对应的宿主上下文。表中只保存弱引用，不延长上下文寿命。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::scripting::context::ContextInner;

thread_local! {
    static CONTEXTS: RefCell<HashMap<usize, Weak<ContextInner>>> = RefCell::new(HashMap::new());
}

pub(crate) fn register(handle: usize, context: &Rc<ContextInner>) {
    CONTEXTS.with(|map| {
        map.borrow_mut().insert(handle, Rc::downgrade(context));
    });
}

pub(crate) fn unregister(handle: usize) -> bool {
    CONTEXTS.with(|map| map.borrow_mut().remove(&handle).is_some())
}

pub(crate) fn lookup(handle: usize) -> Option<Rc<ContextInner>> {
    CONTEXTS.with(|map| map.borrow().get(&handle).and_then(Weak::upgrade))
}

/// 句柄是否对应一个存活的上下文
pub fn is_registered(handle: usize) -> bool {
    lookup(handle).is_some()
}

/// 当前线程上注册的上下文数量
pub fn registered_count() -> usize {
    CONTEXTS.with(|map| map.borrow().values().filter(|w| w.strong_count() > 0).count())
}
