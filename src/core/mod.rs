//! 核心基础设施：错误类型、日志与通用宏

pub mod error;
pub mod logging;
pub mod macros;

pub use error::{BindingError, BindingResult, JsError};
pub use logging::init_logging;
