pub mod memory;
pub mod tools;
