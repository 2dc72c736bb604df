//! Calling script functions from the host.
//!
//! A [`WrappedFunction`] remembers the receiver it was read from. A call
//! converts the host arguments, takes call-scoped references to the function
//! and its receiver, invokes it, converts the result and lets the call-scoped
//! references go.

use rquickjs::function::{Rest, This};
use rquickjs::Value;
use tracing::trace;

use crate::core::{BindingError, BindingResult};
use crate::scripting::engine;
use crate::value::{convert, HostValue, WrappedFunction};

pub(crate) fn call_function(
    function: &WrappedFunction,
    args: &[HostValue],
) -> BindingResult<HostValue> {
    let handle = function.as_value();
    let owner = handle.owner()?;
    let id = handle.id();

    owner.enter(|ctx| {
        let mut engine_args = Vec::with_capacity(args.len());
        for arg in args {
            engine_args.push(convert::to_engine(ctx, &owner, arg)?);
        }

        let (callee, receiver) = owner.restore(ctx, id)?;
        let receiver = receiver.unwrap_or_else(|| ctx.globals().into_value());
        let callee = callee
            .into_function()
            .ok_or_else(|| BindingError::NotCallable("wrapped value is not a function".to_string()))?;

        trace!(
            target: "quickjs_bind::proxy",
            context = owner.id(),
            argc = engine_args.len(),
            "Calling script function"
        );
        let result: rquickjs::Result<Value> = callee.call((This(receiver), Rest(engine_args)));
        let result = engine::check(ctx, &owner, result)?;
        convert::to_host(ctx, &owner, result, None)
    })
}
