pub mod transaction;
pub mod transport;
