pub mod emi;
pub mod engine;
pub mod error;
pub mod foreclosure;
pub mod part_payment;
pub mod payment;
pub mod refinance;
pub mod schedule;
pub mod store;
pub mod types;

pub use error::LoanEngineError;
pub use types::*;

/// Standard result type for all loan-engine operations
pub type LoanEngineResult<T> = Result<T, LoanEngineError>;
