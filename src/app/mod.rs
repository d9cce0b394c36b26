//! Process wiring for the `harvester` binary.

pub(crate) mod context;
pub(crate) mod runtime;
