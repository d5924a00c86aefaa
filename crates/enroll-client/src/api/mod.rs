//! RPC endpoint modules.

mod ecap;

pub use ecap::EcapApi;
