//! IPFS verification. Content returned by `ipfs_get` must hash to the
//! requested id; the id returned by `ipfs_put` must be the id of the
//! submitted content. Neither carries a proof.

use crate::domain::errors::VerificationError;
use crate::domain::ipfs::{content_id, verify_content, ContentEncoding};
use crate::ports::{ProofContext, Verifier};
use vc_02_token_model::Token;

const DEFAULT_ENCODING: ContentEncoding = ContentEncoding::Base64;

fn encoding_param(param: Option<Token<'_>>) -> Result<ContentEncoding, VerificationError> {
    match param {
        Some(name) => ContentEncoding::from_name(name.as_str()?),
        None => Ok(DEFAULT_ENCODING),
    }
}

/// IPFS content verifier.
#[derive(Debug, Default)]
pub struct IpfsVerifier;

impl Verifier for IpfsVerifier {
    fn name(&self) -> &'static str {
        "ipfs"
    }

    fn supports(&self, method: &str) -> bool {
        matches!(method, "ipfs_get" | "ipfs_put")
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let first = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing first param".into()))?;
        let encoding = encoding_param(ctx.param(1))?;
        match ctx.method {
            "ipfs_get" => {
                let content = encoding.decode(ctx.result.as_str()?)?;
                verify_content(first.as_str()?, &content)
            }
            "ipfs_put" => {
                let content = encoding.decode(first.as_str()?)?;
                let computed = content_id(&content)?;
                let returned = ctx.result.as_str()?;
                if computed != returned {
                    return Err(VerificationError::ContentHashMismatch {
                        expected: returned.to_string(),
                        computed,
                    });
                }
                Ok(())
            }
            other => Err(VerificationError::UnsupportedMethod(other.to_string())),
        }
    }
}
