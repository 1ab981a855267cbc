//! Rule data model with serde (de)serialization.
//!
//! - `Condition`: field/operator/threshold predicate, owned 1:1 by a rule
//! - `Rule`: named, activatable wrapper around one condition
//! - `RuleGroup`: named collection of rule references
//! - `HeadGroup`: per meter/load selector referencing groups and rules
//!
//! Groups reference rules by id only; a deleted rule may leave stale ids behind.

mod condition;
mod group;
mod rule;

pub use condition::*;
pub use group::*;
pub use rule::*;

#[cfg(test)]
mod tests;
