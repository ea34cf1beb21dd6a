//! Error Handling Module
//!
//! Error types shared by the streaming core:
//! - Core error type (`LlmError`) and its coarse `ErrorCategory`
//! - Conversions from common error types
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_openai_stream::error::{ErrorCategory, LlmError};
//!
//! let error = LlmError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert!(!error.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;
