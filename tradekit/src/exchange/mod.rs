//! Per-account exchange bookkeeping (component C8): spot and futures
//! balance accounting, plus the sandbox adapter used in paper mode.

pub mod error;
pub mod futures;
pub mod sandbox;
pub mod spot;

pub use error::ExchangeError;
pub use futures::FuturesAccount;
pub use sandbox::{Account, Sandbox};
pub use spot::SpotAccount;
