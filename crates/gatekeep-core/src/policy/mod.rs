pub mod conditions;
pub mod schema;

pub use schema::{Agent, ConditionSet, Permission, PolicyFile};
