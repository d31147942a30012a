//! Interprets the bookkeeping the dynamic loader leaves in a process: the list of loaded
//! modules and each module's dynamic symbol table.
pub mod link_map;
pub mod symbols;
pub mod vtables;

pub use link_map::*;
pub use symbols::*;
pub use vtables::*;
