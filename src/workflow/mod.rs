//! Concrete workflows run by the conversation engine.

pub mod order;
pub mod product;

pub use order::{OrderPlacement, OrderSession, OrderStep};
pub use product::{ProductSession, ProductStep, ProductUpsert};
