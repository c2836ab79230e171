pub mod output;

pub use output::{OutputHost, StreamError};
