//! Live preview streaming for RICOH THETA cameras.
//!
//! The camera serves its preview as Motion JPEG in response to the Open
//! Spherical Camera `getLivePreview` command. [`LiveViewStream`] runs that
//! request on a background thread and hands every decoded [`Frame`] (or the
//! [`Error`] that replaced it) to a delegate. [`LiveView`] layers connection
//! state on top.
//!
//! ```no_run
//! use theta_live_view::{LiveViewSource, LiveViewStream, StreamConfig};
//!
//! let mut stream = LiveViewStream::new(StreamConfig::default());
//! stream.set_delegate(Some(Box::new(|result| match result {
//!     Ok(frame) => println!("frame {} {:?}", frame.sequence(), frame.size()),
//!     Err(e) => eprintln!("live preview: {e}"),
//! })));
//! stream.start("192.168.1.1", None)?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! stream.cancel()?;
//! # Ok::<(), theta_live_view::Error>(())
//! ```

pub mod error;
pub mod frame;
pub mod mjpeg;
pub mod osc;
pub mod stream;
pub mod types;
pub mod view;

// Re-exports
pub use error::*;
pub use frame::*;
pub use osc::LiveViewStream;
pub use stream::*;
pub use types::*;
pub use view::*;
