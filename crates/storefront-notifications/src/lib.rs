pub mod error;
pub mod log;
pub mod sink;
pub mod templates;
pub mod types;

pub use error::NotificationError;
pub use log::MessageLog;
pub use sink::{NotificationSink, NullSink, TracingSink};
pub use templates::{Template, TemplateRenderer};
pub use types::*;
