pub mod domain;
pub mod error;

pub use domain::*;
pub use error::*;

/// Cooperative cancellation signal checked between pages and rows.
pub use tokio_util::sync::CancellationToken;
