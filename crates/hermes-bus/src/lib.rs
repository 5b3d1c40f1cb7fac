pub mod exchange;

pub use exchange::{InProcessExchange, Publisher, Subscription};
