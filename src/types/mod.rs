pub mod document;
pub mod error;
pub mod session;
pub mod traffic;

pub use document::{
    BodySchema, ChainStep, Endpoint, Example, GeneratedDocument, Param, ResponseSpec,
};
pub use error::{ApiDocError, ErrorCategory, LlmError, Result, ResultExt, log_filter_error};
pub use session::{CacheEntry, CacheStatus, Session, SessionStatus};
pub use traffic::TrafficRecord;
