//! Module name resolution hook installed on every runtime.
//!
//! The engine asks for `(base, name)` pairs while linking modules. Relative
//! names are joined against the importing module (or its original URL when the
//! importer was staged from the network), then resolved to a local file which
//! the engine's file loader compiles.

use std::sync::{Arc, Mutex, PoisonError};

use rquickjs::loader::Resolver;
use rquickjs::Ctx;
use tracing::{debug, warn};

use super::ScriptLoader;
use crate::scripting::handles;

pub struct ModuleResolver {
    loader: Arc<Mutex<ScriptLoader>>,
}

impl ModuleResolver {
    pub fn new(loader: Arc<Mutex<ScriptLoader>>) -> Self {
        Self { loader }
    }
}

impl Resolver for ModuleResolver {
    fn resolve<'js>(&mut self, ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        let context = handles::lookup(ctx.as_raw().as_ptr() as usize).map(|c| c.id());
        let mut loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        let target = loader.join(base, name);

        match loader.resolve(&target) {
            Ok(path) => {
                let resolved = path.to_string_lossy().into_owned();
                debug!(
                    target: "quickjs_bind::loader",
                    ?context,
                    base,
                    name,
                    %resolved,
                    "Resolved module"
                );
                Ok(resolved)
            }
            Err(err) => {
                warn!(
                    target: "quickjs_bind::loader",
                    ?context,
                    base,
                    name,
                    error = %err,
                    "Module resolution failed"
                );
                Err(rquickjs::Error::new_resolving_message(
                    base,
                    name,
                    err.to_string(),
                ))
            }
        }
    }
}
