mod chain;
pub(crate) mod encoding;
mod request;
mod response;

pub use chain::*;
pub use request::*;
pub use response::*;
