//! Orders and order creation.

mod address;
mod number;
mod order;
mod repository;
mod service;

pub use address::Address;
pub use number::{ClockOrderNumbers, OrderNumberGenerator, SequentialOrderNumbers};
pub use order::{Order, OrderItem, OrderStatus};
pub use repository::{InMemoryOrderRepository, OrderFilter, OrderRepository};
pub use service::{OrderDetails, OrderService};
