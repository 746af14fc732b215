pub mod collation;
pub mod context;
pub mod runtime;
