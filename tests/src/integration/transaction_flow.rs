//! # Transaction Scenarios
//!
//! `send_transaction` fetches the nonce through a verified account proof and
//! the gas price unverified, signs locally and submits the raw bytes. The
//! node must answer with the hash of exactly those bytes.

#[cfg(test)]
mod tests {
    use crate::fixtures::{eth_client, Collaborators};
    use std::sync::Arc;
    use vc_01_byte_codec::{bytes_to_hex, keccak256, quantity_to_hex};
    use vc_05_proof_verifier::domain::DecodedTransaction;
    use vc_05_proof_verifier::test_utils::account_fixture;
    use vc_06_request_context::test_utils::ScriptedTransport;
    use vc_06_request_context::{LightClient, LocalKeySigner, RequestError, SignerError};

    const NONCE: u64 = 3;
    const GAS_PRICE: u64 = 2_000_000_000;

    fn signer() -> Arc<LocalKeySigner> {
        Arc::new(LocalKeySigner::from_secret(&[0x46; 32]).unwrap())
    }

    /// Node that proves the signer's nonce and echoes the raw transaction
    /// hash, or a wrong one when `lying`.
    fn wallet_transport(from: [u8; 20], lying: bool) -> Arc<ScriptedTransport> {
        let account = account_fixture(from, 1_000_000, NONCE, &[], &[]);
        Arc::new(ScriptedTransport::new(move |_, request| {
            let reply = match request.method() {
                "eth_getTransactionCount" => request.reply(
                    &format!("\"{}\"", quantity_to_hex(NONCE)),
                    Some(&account.proof_json),
                ),
                "eth_gasPrice" => request.reply(&format!("\"{}\"", quantity_to_hex(GAS_PRICE)), None),
                "eth_sendRawTransaction" => {
                    let raw = request.params().item(0).unwrap().as_bytes().unwrap();
                    let mut hash = keccak256(&raw);
                    if lying {
                        hash[0] ^= 0xff;
                    }
                    request.reply(&format!("\"{}\"", bytes_to_hex(&hash)), None)
                }
                _ => request.error(-32601, "method not found"),
            };
            Ok(reply)
        }))
    }

    fn wallet(signer: Arc<LocalKeySigner>, lying: bool) -> (LightClient, Arc<ScriptedTransport>) {
        let transport = wallet_transport(signer.address(), lying);
        let client = eth_client(
            2,
            transport.clone(),
            Collaborators {
                signer: Some(signer),
                ..Collaborators::default()
            },
        );
        (client, transport)
    }

    fn transfer(from: &[u8; 20]) -> String {
        format!(
            r#"{{"from":"{}","to":"{}","value":"0x2710"}}"#,
            bytes_to_hex(from),
            bytes_to_hex(&[0x77; 20])
        )
    }

    #[test]
    fn test_transaction_signed_and_submitted() {
        let signer = signer();
        let (client, transport) = wallet(signer.clone(), false);

        let tx_hash = client.send_transaction(1, &transfer(&signer.address())).unwrap();
        assert_eq!(
            transport.methods(),
            ["eth_getTransactionCount", "eth_gasPrice", "eth_sendRawTransaction"]
        );

        let submitted = transport.requests().pop().unwrap();
        let raw = submitted.params().item(0).unwrap().as_bytes().unwrap();
        assert_eq!(tx_hash, bytes_to_hex(&keccak256(&raw)));

        let decoded = DecodedTransaction::decode(&raw).unwrap();
        assert_eq!(decoded.sender().unwrap(), signer.address());
        assert_eq!(decoded.chain_id, Some(1));
        assert_eq!(decoded.nonce, NONCE);
        assert_eq!(decoded.to, Some([0x77; 20]));
    }

    #[test]
    fn test_explicit_nonce_and_price_skip_lookups() {
        let signer = signer();
        let (client, transport) = wallet(signer.clone(), false);
        let tx = format!(
            r#"{{"from":"{}","to":"{}","nonce":"0x9","gasPrice":"0x1"}}"#,
            bytes_to_hex(&signer.address()),
            bytes_to_hex(&[0x77; 20])
        );
        client.send_transaction(1, &tx).unwrap();
        assert_eq!(transport.methods(), ["eth_sendRawTransaction"]);

        let raw = transport.requests()[0].params().item(0).unwrap().as_bytes().unwrap();
        assert_eq!(DecodedTransaction::decode(&raw).unwrap().nonce, 9);
    }

    #[test]
    fn test_wrong_submission_hash_rejected() {
        let signer = signer();
        let (client, _) = wallet(signer.clone(), true);
        let err = client
            .send_transaction(1, &transfer(&signer.address()))
            .unwrap_err();
        assert!(matches!(err.root_cause(), RequestError::Verification { .. }));
    }

    #[test]
    fn test_missing_signer_fails_before_dispatch() {
        let from = [0x46; 20];
        let transport = wallet_transport(from, false);
        let client = eth_client(2, transport.clone(), Collaborators::default());
        let err = client.send_transaction(1, &transfer(&from)).unwrap_err();
        assert!(matches!(err, RequestError::Signer(SignerError::Unavailable)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_foreign_account_not_signed() {
        let (client, transport) = wallet(signer(), false);
        let tx = format!(
            r#"{{"from":"{}","nonce":"0x0","gasPrice":"0x1"}}"#,
            bytes_to_hex(&[0x12; 20])
        );
        let err = client.send_transaction(1, &tx).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Signer(SignerError::UnknownAccount(_))
        ));
        assert!(!transport
            .methods()
            .contains(&"eth_sendRawTransaction".to_string()));
    }
}
