// Chat-facing layer: inbound command handling and outbound messages

pub mod bot;
pub mod outbound;

// Re-export commonly used types
pub use bot::{Bot, CommandError, Submission, User};
pub use outbound::{BufferedSink, LogSink, MessageSink};
