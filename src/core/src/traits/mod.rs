//! Callback seams between the engine and its host

pub mod externals;

pub use externals::{Externals, NoExternals};
