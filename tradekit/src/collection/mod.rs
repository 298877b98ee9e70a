//! Low-level collection types shared by the market-data state machines.

mod dynamic_array;

pub use dynamic_array::{DynamicArray, DynamicArrayError};
