// ============================================================================
// 脚本引擎生命周期
// 运行时 -> 上下文 -> 包装值 的所有权链，以及引擎回调到宿主对象的映射
// ============================================================================

pub mod context;
pub(crate) mod engine;
pub mod flags;
pub mod handles;
pub(crate) mod prelude;
pub mod registry;
pub mod runtime;

pub use context::Context;
pub use flags::EvalFlags;
pub use registry::ValueId;
pub use runtime::{MemoryStats, Runtime};
