//! IRC protocol layer: line framing, message parsing, and the session state
//! machine that tracks channels and membership.

pub mod channel;
pub mod framer;
pub mod message;
pub mod observer;
pub mod session;

pub use channel::{Channel, Member};
pub use framer::LineFramer;
pub use message::{ParsedMessage, Prefix};
pub use observer::{EventSink, MessageTarget, SessionEvent, SessionObserver};
pub use session::{IrcSession, SessionConfig};
