use tsdb_bridge::{BridgeHost, BridgeMethod, EnsureIndexPayload, Request, Resolution, ResolutionMode};

/// A request against a collection id with no bound adapter fails with
/// `UNKNOWN_COLLECTION` rather than panicking or hanging.
#[tokio::test]
async fn a_request_for_an_unbound_collection_returns_unknown_collection() {
    let host = BridgeHost::new();

    let request = Request {
        v: 1,
        request_id: "req-1".to_string(),
        collection_id: "ghost".to_string(),
        resolution: Some(Resolution {
            mode: ResolutionMode::SyncAbsent,
            schema_version: None,
        }),
        method: BridgeMethod::EnsureIndex(EnsureIndexPayload {
            signature: "sig".to_string(),
            fields: vec!["a".to_string()],
        }),
    };

    let response = host.handle(request).await;
    assert!(!response.ok);
    let error = response.error.expect("unknown collection produces an error body");
    assert_eq!(error.code.as_deref(), Some("UNKNOWN_COLLECTION"));
    assert_eq!(response.request_id, "req-1");
    assert_eq!(response.method, "ensureIndex");
}
