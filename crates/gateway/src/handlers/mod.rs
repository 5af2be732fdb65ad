//! API handlers module

pub mod companies;
pub mod documents;
pub mod health;
pub mod scoring;
pub mod search;

use dealflow_common::errors::{AppError, Result};
use validator::Validate;

/// Run `validator` rules, mapping failures to a 400
pub(crate) fn validate_request<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::invalid_argument(e.to_string()))
}
