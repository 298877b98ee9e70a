//! Order lifecycle and repository (component C6).

pub mod error;
pub mod model;
pub mod repository;

pub use error::OrderError;
pub use model::{Order, OrderKind, OrderStatus, Side};
pub use repository::OrderRepository;
