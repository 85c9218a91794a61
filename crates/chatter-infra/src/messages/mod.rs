//! Message log implementations.

mod memory;

pub use memory::InMemoryMessageRepository;
