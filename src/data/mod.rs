pub mod association;
pub mod token;

pub use association::Association;
pub use token::RandomStringGenerator;
