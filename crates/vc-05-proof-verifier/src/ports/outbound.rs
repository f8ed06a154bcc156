//! Outbound port: nested requests made while verifying.

use crate::domain::errors::VerificationError;
use vc_02_token_model::Document;

/// Issues a verified request on the same chain and returns its result.
///
/// Implemented by the request engine; the nested request goes through the
/// same cache, node selection and verification path as a top-level one.
pub trait SubRequester {
    /// Send `method` with `params_json` (a JSON array) and return the
    /// verified result.
    fn request(&self, method: &str, params_json: &str) -> Result<Document, VerificationError>;
}
