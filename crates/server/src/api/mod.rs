//! HTTP handlers, one module per resource.

mod common;
mod groups;
mod head_groups;
mod health;
mod rules;
mod validate;

pub use groups::*;
pub use head_groups::*;
pub use health::*;
pub use rules::*;
pub use validate::*;
