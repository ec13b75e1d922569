pub mod account;
pub mod decision;
pub mod symbol_spec;
pub mod types;
