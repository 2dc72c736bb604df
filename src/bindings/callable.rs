//! Host callables exposed to scripts.
//!
//! Every host function passed into the engine gets a slot in its context's
//! [`CallableRegistry`]. The engine-side function object only captures the
//! slot id; the trampoline looks the owning context up through the handle map,
//! converts the arguments, runs the host function and converts the result back.
//! Slots live until the context is torn down because the engine may keep the
//! function object reachable for as long as the context exists.

use std::rc::Rc;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Value};
use tracing::{trace, warn};

use crate::core::{BindingError, BindingResult};
use crate::scripting::context::ContextInner;
use crate::scripting::{engine, handles};
use crate::value::{convert, HostFunction, HostValue};

/// Identifier of a registered host callable within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId(u32);

#[derive(Default)]
pub(crate) struct CallableRegistry {
    entries: Vec<HostFunction>,
}

impl CallableRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, function: HostFunction) -> CallableId {
        let id = CallableId(self.entries.len() as u32);
        self.entries.push(function);
        id
    }

    pub(crate) fn get(&self, id: CallableId) -> Option<HostFunction> {
        self.entries.get(id.0 as usize).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes every callable, returning them so they drop outside the borrow.
    pub(crate) fn clear(&mut self) -> Vec<HostFunction> {
        std::mem::take(&mut self.entries)
    }
}

/// Keeps the engine arguments of a host call referenced until the call returns.
pub(crate) struct ArgumentPin<'js> {
    args: Vec<Value<'js>>,
}

impl<'js> ArgumentPin<'js> {
    pub(crate) fn new(args: Vec<Value<'js>>) -> Self {
        Self { args }
    }

    pub(crate) fn to_host(
        &self,
        ctx: &Ctx<'js>,
        owner: &Rc<ContextInner>,
    ) -> BindingResult<Vec<HostValue>> {
        self.args
            .iter()
            .map(|arg| convert::to_host(ctx, owner, arg.clone(), None))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.args.len()
    }
}

/// Registers `host` with `owner` and creates the engine function that forwards to it.
pub(crate) fn create_engine_function<'js>(
    ctx: &Ctx<'js>,
    owner: &Rc<ContextInner>,
    host: &HostFunction,
) -> BindingResult<Value<'js>> {
    let id = owner.register_callable(host.clone());

    let function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            trampoline(&ctx, id, args.0)
        },
    );
    let mut function = engine::check(ctx, owner, function)?;
    function = engine::check(ctx, owner, function.with_length(host.arity()))?;
    if let Some(name) = host.name() {
        function = engine::check(ctx, owner, function.with_name(name))?;
    }

    trace!(
        target: "quickjs_bind::callable",
        context = owner.id(),
        ?id,
        arity = host.arity(),
        "Registered host callable"
    );
    Ok(function.into_value())
}

fn trampoline<'js>(
    ctx: &Ctx<'js>,
    id: CallableId,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let handle = ctx.as_raw().as_ptr() as usize;
    let Some(owner) = handles::lookup(handle) else {
        return Err(Exception::throw_message(
            ctx,
            "host callable invoked on a context that is no longer registered",
        ));
    };
    let Some(host) = owner.callable(id) else {
        return Err(Exception::throw_message(ctx, "unknown host callable"));
    };

    let _scope = owner.activate(ctx);
    let pinned = ArgumentPin::new(args);
    trace!(
        target: "quickjs_bind::callable",
        context = owner.id(),
        ?id,
        argc = pinned.len(),
        "Invoking host callable"
    );

    let result = pinned
        .to_host(ctx, &owner)
        .and_then(|host_args| host.invoke(&host_args))
        .and_then(|ret| convert::to_engine(ctx, &owner, &ret));
    drop(pinned);

    match result {
        Ok(value) => Ok(value),
        Err(BindingError::Exception(err)) => {
            // script exceptions crossing a host frame are rethrown unchanged
            match convert::to_engine(ctx, &owner, err.value()) {
                Ok(value) => Err(ctx.throw(value)),
                Err(_) => Err(Exception::throw_message(ctx, err.message())),
            }
        }
        Err(err) => {
            warn!(
                target: "quickjs_bind::callable",
                context = owner.id(),
                ?id,
                error = %err,
                "Host callable failed"
            );
            Err(Exception::throw_message(ctx, &err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_assigns_sequential_ids() {
        let mut registry = CallableRegistry::new();
        let a = registry.register(HostFunction::new(0, |_| Ok(HostValue::Null)));
        let b = registry.register(HostFunction::new(1, |_| Ok(HostValue::Null)));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(b).map(|f| f.arity()), Some(1));
    }

    #[test]
    fn test_clear_empties_registry() {
        let mut registry = CallableRegistry::new();
        let id = registry.register(HostFunction::new(0, |_| Ok(HostValue::Null)));
        assert_eq!(registry.clear().len(), 1);
        assert!(registry.get(id).is_none());
        assert_eq!(registry.len(), 0);
    }
}
