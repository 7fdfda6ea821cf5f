pub mod generator;
#[cfg(test)]
pub mod memory;
pub mod processor;
pub mod store;
pub mod sync;
