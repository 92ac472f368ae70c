pub mod context;
pub mod error;
pub mod result;

pub use context::Context;
pub use error::WtreeError;
pub use result::WtreeResult;
