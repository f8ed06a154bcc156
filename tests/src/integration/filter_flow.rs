//! # Filter Scenarios
//!
//! Filters are driven purely through `LightClient::send`, the way a JSON-RPC
//! caller would use them. Every poll goes through the verified request path,
//! so a node answering with logs outside the filter is rejected.

#[cfg(test)]
mod tests {
    use crate::fixtures::{eth_client, Collaborators};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use vc_01_byte_codec::{bytes_to_hex, quantity_to_hex};
    use vc_02_token_model::Document;
    use vc_05_proof_verifier::test_utils::{block_json, logs_fixture, sample_header, LOG_EMITTER};
    use vc_06_request_context::test_utils::ScriptedTransport;
    use vc_06_request_context::{LightClient, RequestError};

    fn chain_transport(head: Arc<AtomicU64>) -> Arc<ScriptedTransport> {
        let logs = logs_fixture();
        Arc::new(ScriptedTransport::new(move |_, request| {
            let reply = match request.method() {
                "eth_blockNumber" => request.reply(
                    &format!("\"{}\"", quantity_to_hex(head.load(Ordering::SeqCst))),
                    None,
                ),
                "eth_getBlockByNumber" => {
                    let number = request.params().at(0).unwrap().as_u64().unwrap();
                    request.reply(&block_json(&sample_header(number), &[], false), None)
                }
                "eth_getLogs" => request.reply(&logs.result_json, Some(&logs.proof_json)),
                _ => request.error(-32601, "method not found"),
            };
            Ok(reply)
        }))
    }

    fn install(client: &LightClient, method: &str, params: &str) -> String {
        let id = client.send(1, method, params).unwrap();
        Document::parse_json(&id)
            .unwrap()
            .root()
            .as_str()
            .unwrap()
            .to_string()
    }

    fn changes(client: &LightClient, id: &str) -> Result<Document, RequestError> {
        let json = client.send(1, "eth_getFilterChanges", &format!(r#"["{id}"]"#))?;
        Ok(Document::parse_json(json).unwrap())
    }

    #[test]
    fn test_event_filter_lifecycle() {
        let head = Arc::new(AtomicU64::new(99));
        let client = eth_client(2, chain_transport(head.clone()), Collaborators::default());
        let id = install(
            &client,
            "eth_newFilter",
            &format!(r#"[{{"address":"{}"}}]"#, bytes_to_hex(&LOG_EMITTER)),
        );
        assert_eq!(id, "0x1");

        assert!(changes(&client, &id).unwrap().root().is_empty());
        head.store(100, Ordering::SeqCst);
        let logs = changes(&client, &id).unwrap();
        assert_eq!(logs.root().len(), 1);
        let log = logs.root().item(0).unwrap();
        assert_eq!(log.get("address").unwrap().as_address().unwrap(), LOG_EMITTER);
        assert!(changes(&client, &id).unwrap().root().is_empty());

        assert_eq!(
            client
                .send(1, "eth_uninstallFilter", &format!(r#"["{id}"]"#))
                .unwrap(),
            "true"
        );
        assert!(changes(&client, &id).is_err());
        assert_eq!(
            client
                .send(1, "eth_uninstallFilter", &format!(r#"["{id}"]"#))
                .unwrap(),
            "false"
        );
    }

    #[test]
    fn test_log_outside_filter_rejected() {
        let head = Arc::new(AtomicU64::new(99));
        let client = eth_client(2, chain_transport(head.clone()), Collaborators::default());
        let id = install(
            &client,
            "eth_newFilter",
            &format!(r#"[{{"address":"{}"}}]"#, bytes_to_hex(&[0xdd; 20])),
        );
        head.store(100, Ordering::SeqCst);

        let err = changes(&client, &id).unwrap_err();
        assert!(matches!(err.root_cause(), RequestError::Verification { .. }));
        // A rejected poll leaves the window where it was.
        assert_eq!(client.filters().get(1).unwrap().last_block, 99);
    }

    #[test]
    fn test_block_filter_through_send() {
        let head = Arc::new(AtomicU64::new(5));
        let client = eth_client(2, chain_transport(head.clone()), Collaborators::default());
        let id = install(&client, "eth_newBlockFilter", "[]");

        head.store(7, Ordering::SeqCst);
        let hashes = changes(&client, &id).unwrap();
        let expected: Vec<String> = (6..=7)
            .map(|n| bytes_to_hex(&sample_header(n).hash()))
            .collect();
        let got: Vec<String> = hashes
            .root()
            .iter()
            .map(|h| h.as_str().unwrap().to_string())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_filter_ids_do_not_cross_chains() {
        let head = Arc::new(AtomicU64::new(5));
        let transport = chain_transport(head);
        let client = crate::fixtures::client_for(
            vec![
                vc_05_proof_verifier::ChainConfig::ethereum(1),
                vc_05_proof_verifier::ChainConfig::ethereum(5),
            ],
            2,
            transport,
            Collaborators::default(),
        );
        let id = install(&client, "eth_newBlockFilter", "[]");
        assert!(client
            .send(5, "eth_getFilterChanges", &format!(r#"["{id}"]"#))
            .is_err());
        assert_eq!(
            client
                .send(5, "eth_uninstallFilter", &format!(r#"["{id}"]"#))
                .unwrap(),
            "false"
        );
        assert_eq!(client.filters().len(), 1);
    }
}
