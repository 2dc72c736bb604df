//! 每个上下文创建时安装的辅助脚本
//!
//! - `__stringifyObject`: 宿主渲染任意值时使用，能处理循环引用、Symbol、BigInt 与 Date
//! - `crypto.getRandomValues`: 引擎缺少时的最小实现
//! - `console.*`: 转发到 tracing，target 为 `script.console`

use std::rc::Rc;

use crate::config::ContextConfig;
use crate::core::BindingResult;
use crate::scripting::context::ContextInner;
use crate::scripting::engine::{self, STRINGIFY_HELPER};
use crate::scripting::flags::EvalFlags;
use crate::value::{convert, HostFunction, HostValue};

const STRINGIFY_SOURCE: &str = r#"
(function () {
    if (globalThis.__stringifyObject) {
        return;
    }

    function render(root) {
        const visited = new WeakSet();

        function walk(value) {
            switch (typeof value) {
                case 'symbol':
                    return '"' + (value.description || value.toString()) + '"';
                case 'bigint':
                    return value.toString();
                case 'function':
                    return '[Function ' + (value.name || 'anonymous') + ']';
                case 'undefined':
                    return 'undefined';
                case 'object':
                    break;
                default:
                    return JSON.stringify(value);
            }
            if (value === null) {
                return 'null';
            }
            if (visited.has(value)) {
                return '[Circular]';
            }
            visited.add(value);

            if (Array.isArray(value)) {
                return '[' + value.map(walk).join(',') + ']';
            }
            if (value instanceof Date) {
                return '"' + value.toISOString() + '"';
            }
            const parts = [];
            for (const key of Object.keys(value)) {
                parts.push(JSON.stringify(key) + ':' + walk(value[key]));
            }
            return '{' + parts.join(',') + '}';
        }

        return walk(root);
    }

    globalThis.__stringifyObject = render;
})();
"#;

const CRYPTO_SOURCE: &str = r#"
(function () {
    if (globalThis.crypto && typeof globalThis.crypto.getRandomValues === 'function') {
        return;
    }
    globalThis.crypto = {
        getRandomValues(target) {
            for (let i = 0; i < target.length; i++) {
                target[i] = Math.floor(Math.random() * 256);
            }
            return target;
        },
    };
})();
"#;

pub(crate) fn install(owner: &Rc<ContextInner>, config: &ContextConfig) -> BindingResult<()> {
    run(owner, STRINGIFY_SOURCE, "<prelude:stringify>")?;
    if config.crypto_polyfill {
        run(owner, CRYPTO_SOURCE, "<prelude:crypto>")?;
    }
    if config.console {
        install_console(owner)?;
    }
    Ok(())
}

fn run(owner: &Rc<ContextInner>, source: &str, name: &str) -> BindingResult<()> {
    owner.enter(|ctx| {
        let value = engine::eval_raw(ctx, source, name, EvalFlags::GLOBAL)?;
        convert::to_host(ctx, owner, value, None).map(drop)
    })
}

fn install_console(owner: &Rc<ContextInner>) -> BindingResult<()> {
    let mut console = std::collections::BTreeMap::new();
    for level in ["log", "info", "debug", "warn", "error"] {
        console.insert(
            level.to_string(),
            HostValue::Function(HostFunction::named(level, 0, move |args| {
                let line = render_line(args);
                match level {
                    "error" => tracing::error!(target: "script.console", "{}", line),
                    "warn" => tracing::warn!(target: "script.console", "{}", line),
                    "debug" => tracing::debug!(target: "script.console", "{}", line),
                    _ => tracing::info!(target: "script.console", "{}", line),
                }
                Ok(HostValue::Undefined)
            })),
        );
    }

    owner.enter(|ctx| {
        let value = convert::to_engine(ctx, owner, &HostValue::Map(console))?;
        engine::check(ctx, owner, ctx.globals().set("console", value))
    })
}

/// 字符串原样输出，其它值按宿主显示规则渲染
fn render_line(args: &[HostValue]) -> String {
    args.iter()
        .map(|arg| match arg {
            HostValue::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line_joins_with_spaces() {
        let line = render_line(&[
            HostValue::from("x ="),
            HostValue::Int(3),
            HostValue::Null,
        ]);
        assert_eq!(line, "x = 3 null");
    }
}
