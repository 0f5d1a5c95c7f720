//! Dough Validation - client-side form validation core
//!
//! # Guarantees
//! 1. Constraints mirror native browser semantics
//! 2. The summary lists errors in page order, never insertion order
//! 3. Server-rendered errors are never overwritten
//! 4. Every CSS hook is configurable
//! 5. Messages come from markup and are inserted as text

pub mod component;
pub mod config;
pub mod dom;
pub mod validation;

pub use component::{boot, dispatch, Component, ComponentError, EventKind, InitStatus, UiEvent};
pub use config::{ConfigError, ValidationConfig};
pub use dom::{Document, NodeId};
pub use validation::{ErrorRegistry, FieldValidity, Validation, ValidationState};

pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
