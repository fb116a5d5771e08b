pub mod problem;
pub use problem::*;

pub mod store;
pub use store::*;
