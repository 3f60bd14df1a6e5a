//! Concrete messaging service implementations.

pub mod in_memory;
pub mod rabbitmq;

pub use in_memory::InMemoryMessagingService;
pub use rabbitmq::RabbitMqMessagingService;
