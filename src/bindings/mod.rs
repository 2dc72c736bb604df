//! Host/engine call bridge.
//!
//! ```text
//!   host code                         script code
//!  ┌──────────────┐  WrappedFunction ┌──────────────┐
//!  │ HostValue    │ ───── proxy ───▶ │ JS function  │
//!  │              │                  │              │
//!  │ HostFunction │ ◀── callable ─── │ JS caller    │
//!  └──────────────┘   trampoline     └──────────────┘
//! ```
//!
//! [`proxy`] drives script functions from the host; [`callable`] exposes host
//! functions to scripts through a per-context registry.

pub mod callable;
pub(crate) mod proxy;

pub use callable::CallableId;
