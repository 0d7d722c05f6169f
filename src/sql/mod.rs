//! Safe SQL builder: identifiers quoted from the live schema, values as parameters.

mod builder;
pub mod filter;
pub mod params;
pub use builder::*;
pub use filter::{CompareOp, Condition, Filter};
pub use params::*;
