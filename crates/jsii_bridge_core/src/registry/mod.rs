//! Bridge-side registries: native types by fqn, live objects by reference.

pub mod object_table;
pub mod type_registry;
