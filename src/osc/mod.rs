//! Live preview over the Open Spherical Camera HTTP API, as spoken by
//! RICOH THETA cameras.

pub(crate) mod command;
pub mod stream;

pub use stream::LiveViewStream;
