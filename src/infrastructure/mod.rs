pub mod clients;
pub mod memory;
pub mod models;
pub mod order_repo;
pub mod outbox;

pub use memory::InMemoryOrderRepository;
pub use order_repo::DieselOrderRepository;
