pub mod breaker;
pub mod periodic_column;
pub mod polynomial;

pub use breaker::PolynomialBreaker;
pub use periodic_column::PeriodicColumn;
pub use polynomial::CompositionPolynomial;
