mod cancel;
mod time;
mod writer;

pub use cancel::{CancelHandle, Cancellation, cancellation};
pub use time::{format_local, local_rfc3339, now_local};
pub use writer::{RunFolder, RunMetadata};
