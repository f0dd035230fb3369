pub mod common;
pub mod mcp;
pub mod tools;
pub mod xlsx;
