//! Session runtime for the shared whiteboard.
//!
//! Inbound packets enter the [`Dispatcher`], which updates the project store,
//! resolves teacher actions, and (re)schedules board feedback through the
//! [`FeedbackScheduler`]. Replies go out through a [`ReplyGenerator`]
//! supplied by the host.

pub mod dispatcher;
pub mod feedback;
pub mod prompt;
pub mod reply;
pub mod session;

pub use dispatcher::{Dispatcher, Route};
pub use feedback::{FeedbackScheduler, FeedbackTrigger};
pub use reply::{LogReplyGenerator, RecordingReplyGenerator, ReplyGenerator, ReplyInput, ReplyRequest};
pub use session::SessionContext;
