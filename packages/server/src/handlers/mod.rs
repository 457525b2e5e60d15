pub mod chunk;
pub mod session;
