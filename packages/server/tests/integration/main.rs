mod chunk;
mod common;
mod session;
