pub mod record_callback;

pub use record_callback::{RecordCallbackCommand, RecordCallbackError, RecordCallbackResponse};
