//! End-to-end conformance tests for the restmap HTTP node.
//!
//! Each test spawns an ephemeral in-process node (real TCP, real HTTP) via
//! [`restmap_conformance::spawn_node`] and drives it with a `reqwest` client.
//! The node maps the sample values:
//!
//! | Prefix | Value | Access |
//! |--------|-------|--------|
//! | `/mutable/` | `{"String":"teststr","Numbers":[6,9,42],"Map":{...}}` | read-write |
//! | `/readonly/` | same record, snapshot | read-only |
//! | `/int/` | `0` | read-write |
//! | `/str/` | `"test"` | read-only |
//!
//! # Coverage
//!
//! | Test | Behaviour |
//! |------|-----------|
//! | `get_nested_values` | path resolution through records, sequences, maps |
//! | `record_fields_are_case_insensitive` | case-insensitive field lookup |
//! | `missing_sub_entities_return_404` | sequence bounds, non-numeric indices |
//! | `delete_on_record_returns_405` | per-shape method rules |
//! | `snapshot_rejects_writes_with_403` | read-only enforcement |
//! | `options_reports_allow_header` | metadata method |
//! | `head_matches_get_without_body` | HEAD semantics |
//! | `accept_selects_representation` | content negotiation |
//! | `unacceptable_accept_returns_406` | negotiation failure |
//! | `put_replaces_scalar` | whole-value replace |
//! | `put_updates_record_fields` | partial record update |
//! | `post_appends_and_sets_location` | sequence append |
//! | `unknown_method_returns_501` | unrecognized methods |
//! | `connect_returns_405` | blocked method |
//! | `unsupported_content_type_returns_415` | body decoding |
//! | `percent_encoded_paths_are_decoded` | transport path decoding |
//! | `readers_never_observe_a_half_applied_update` | lock exclusivity under load |

use restmap_conformance::spawn_node;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap()
}

async fn get_text(client: &reqwest::Client, url: String) -> (u16, String) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_nested_values() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    let cases = [
        ("/mutable/numbers/2", "42"),
        ("/mutable/map/true", "true"),
        ("/mutable/string", "\"teststr\""),
        ("/int/", "0"),
        ("/str/", "\"test\""),
        (
            "/mutable/",
            r#"{"String":"teststr","Numbers":[6,9,42],"Map":{"false":false,"true":true}}"#,
        ),
    ];
    for (path, want) in cases {
        assert_eq!(
            get_text(&client, format!("{base}{path}")).await,
            (200, want.to_string()),
            "GET {path}"
        );
    }
}

#[tokio::test]
async fn record_fields_are_case_insensitive() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    for path in ["/mutable/Numbers", "/mutable/numbers", "/mutable/nUMbErs"] {
        assert_eq!(
            get_text(&client, format!("{base}{path}")).await,
            (200, "[6,9,42]".to_string()),
            "GET {path}"
        );
    }
}

#[tokio::test]
async fn missing_sub_entities_return_404() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    for path in [
        "/mutable/numbers/3",
        "/mutable/numbers/true",
        "/mutable/map/2",
        "/str/blah",
        "/missing/",
    ] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), 404, "GET {path}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "not_found", "GET {path}");
    }
}

#[tokio::test]
async fn head_matches_get_without_body() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();
    let url = format!("{base}/mutable/numbers");

    let get = client.get(&url).send().await.unwrap();
    let head = client.head(&url).send().await.unwrap();
    assert_eq!(head.status(), get.status());
    assert_eq!(
        head.headers().get("content-type"),
        get.headers().get("content-type")
    );
    assert!(head.text().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Method rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_on_record_returns_405() {
    let (base, _, _) = spawn_node().await;
    let resp = make_client()
        .delete(format!("{base}/mutable/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
}

#[tokio::test]
async fn snapshot_rejects_writes_with_403() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    for method in ["DELETE", "PATCH", "POST", "PUT"] {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        let resp = client
            .request(method.clone(), format!("{base}/readonly/"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403, "{method} /readonly/");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "read_only");
    }
}

#[tokio::test]
async fn options_reports_allow_header() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    let cases = [
        ("/mutable/", "OPTIONS, HEAD, GET, POST, PATCH, PUT, DELETE"),
        ("/readonly/", "OPTIONS, HEAD, GET"),
    ];
    for (path, want) in cases {
        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{base}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("allow").unwrap(), want, "OPTIONS {path}");
    }
}

#[tokio::test]
async fn unknown_method_returns_501() {
    let (base, _, _) = spawn_node().await;
    let resp = make_client()
        .request(
            reqwest::Method::from_bytes(b"UNKNOWN").unwrap(),
            format!("{base}/mutable/"),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 501);
}

#[tokio::test]
async fn connect_returns_405() {
    let (base, registry, _) = spawn_node().await;
    // CONNECT never reaches an HTTP/1.1 server with a path URI, so go
    // through the registry the node serves from.
    let request = restmap::Request::new("CONNECT", "/mutable/");
    let err = registry.dispatch(&request).unwrap_err();
    assert_eq!(err.status().code(), 405);

    // The node is still healthy afterwards.
    let (status, _) = get_text(&make_client(), format!("{base}/int")).await;
    assert_eq!(status, 200);
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accept_selects_representation() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    let resp = client
        .get(format!("{base}/mutable/string"))
        .header("accept", "text/plain")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert_eq!(ct, "text/plain;charset=utf-8");
    assert_eq!(resp.headers().get("vary").unwrap(), "Accept");
    assert_eq!(resp.text().await.unwrap(), "teststr");

    let resp = client
        .get(format!("{base}/mutable/string"))
        .header("accept", "text/plain;q=0.9, application/json;q=0.1")
        .send()
        .await
        .unwrap();
    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/plain"), "{ct}");
}

#[tokio::test]
async fn unacceptable_accept_returns_406() {
    let (base, _, _) = spawn_node().await;
    let resp = make_client()
        .get(format!("{base}/mutable/"))
        .header("accept", "text/plain")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 406);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_acceptable");
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_replaces_scalar() {
    let (base, _, mounted) = spawn_node().await;
    let client = make_client();

    let resp = client
        .put(format!("{base}/int"))
        .header("content-type", "application/json")
        .body("42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "42");
    assert_eq!(*mounted.int.read().unwrap(), 42);
    assert_eq!(get_text(&client, format!("{base}/int")).await, (200, "42".into()));
}

#[tokio::test]
async fn put_updates_record_fields() {
    let (base, _, mounted) = spawn_node().await;
    let client = make_client();

    let resp = client
        .put(format!("{base}/mutable"))
        .json(&json!({"string": "changed", "map": {"only": true}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["String"], "changed");
    assert_eq!(body["Numbers"], json!([6, 9, 42]));
    assert_eq!(body["Map"], json!({"only": true}));

    let sample = mounted.mutable.read().unwrap();
    assert_eq!(sample.string, "changed");
    assert_eq!(sample.map.len(), 1);
}

#[tokio::test]
async fn post_appends_and_sets_location() {
    let (base, _, _) = spawn_node().await;
    let client = make_client();

    let resp = client
        .post(format!("{base}/mutable/numbers"))
        .json(&json!(100))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "/mutable/numbers/3"
    );
    assert_eq!(resp.text().await.unwrap(), "[6,9,42,100]");
    assert_eq!(
        get_text(&client, format!("{base}/mutable/numbers/3")).await,
        (200, "100".into())
    );
}

#[tokio::test]
async fn unsupported_content_type_returns_415() {
    let (base, _, _) = spawn_node().await;
    let resp = make_client()
        .put(format!("{base}/int"))
        .header("content-type", "application/xml")
        .body("<int>1</int>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
}

#[tokio::test]
async fn percent_encoded_paths_are_decoded() {
    let (base, registry, _) = spawn_node().await;
    registry
        .map_snapshot("/with space", std::collections::HashMap::from([(
            "a key".to_string(),
            7i64,
        )]))
        .unwrap();

    assert_eq!(
        get_text(&make_client(), format!("{base}/with%20space/a%20key")).await,
        (200, "7".into())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_half_applied_update() {
    let (base, _, mounted) = spawn_node().await;
    let client = make_client();
    let url = format!("{base}/mutable");

    // Each writer sets two fields that must always agree.
    let mut writers = Vec::new();
    for i in 0..8i64 {
        let client = client.clone();
        let url = url.clone();
        writers.push(tokio::spawn(async move {
            for round in 0..5i64 {
                let n = i * 100 + round;
                let resp = client
                    .put(&url)
                    .json(&json!({"string": format!("w{n}"), "numbers": [n, n, n]}))
                    .send()
                    .await
                    .unwrap();
                assert_eq!(resp.status(), 200);
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let url = url.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..10 {
                let body: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
                let string = body["String"].as_str().unwrap().to_string();
                if string == "teststr" {
                    assert_eq!(body["Numbers"], json!([6, 9, 42]));
                } else {
                    let n: i64 = string.trim_start_matches('w').parse().unwrap();
                    assert_eq!(body["Numbers"], json!([n, n, n]), "{string}");
                }
            }
        }));
    }

    for task in writers.into_iter().chain(readers) {
        task.await.unwrap();
    }

    let sample = mounted.mutable.read().unwrap();
    let n: i64 = sample.string.trim_start_matches('w').parse().unwrap();
    assert_eq!(sample.numbers, vec![n, n, n]);
}
