//! Exchange abstraction layer.
//!
//! [`ExchangeClient`] is the only surface the engine core sees. Real
//! adapters live outside this crate; [`MockExchange`] ships here because it
//! backs both the test suite and credential-less runs.

mod mock;
mod traits;

pub use mock::{FillMode, MockExchange};
pub use traits::{ExchangeClient, OpenOrder, PlaceOrderOutcome};
