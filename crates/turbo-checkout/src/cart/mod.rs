//! Shopping cart module.
//!
//! The cart is the input snapshot priced by the engine and converted into an
//! order. Cart storage is owned by the caller behind [`CartRepository`].

mod cart;
mod repository;

pub use cart::{Cart, CartItem};
pub use repository::{CartRepository, InMemoryCartRepository};
