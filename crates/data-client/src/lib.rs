mod block;
mod boxed;
mod types;
pub mod reqwest;


pub use block::*;
pub use boxed::*;
pub use types::*;
