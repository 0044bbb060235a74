use gif_cms::{build_router, AppState, CmsConfig};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn spawn_app(config: CmsConfig) -> std::net::SocketAddr {
    let state = AppState::from_config(&config).expect("app state");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn send_raw(addr: std::net::SocketAddr, method: &str, path: &str, body: Option<&Value>) -> (u16, Value) {
    let payload = body.map(|b| b.to_string());
    send_text(addr, method, path, payload.as_deref()).await
}

async fn send_text(addr: std::net::SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, Value) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let payload = body.unwrap_or_default();
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if body.is_some() {
        req.push_str("Content-Type: application/json\r\n");
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n", payload.len()));
    req.push_str(payload);
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    let json = serde_json::from_str(body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(addr: std::net::SocketAddr, path: &str) -> (u16, Value) {
    send_raw(addr, "GET", path, None).await
}

async fn post(addr: std::net::SocketAddr, path: &str, body: Value) -> (u16, Value) {
    send_raw(addr, "POST", path, Some(&body)).await
}

fn facility() -> Value {
    json!({
        "localGovernmentCode": "131016",
        "identifier": "fac-001",
        "name": "中央図書館",
        "facilityType": "library",
        "latitude": 35.6895,
        "longitude": 139.6917,
        "datasetUpdatedAt": "2024-05-01"
    })
}

async fn create_model(addr: std::net::SocketAddr, template_id: &str) -> String {
    let (status, model) = post(addr, "/api/models", json!({"templateId": template_id})).await;
    assert_eq!(status, 201);
    model["id"].as_str().expect("model id").to_string()
}

#[tokio::test]
async fn health_and_template_listing() {
    let addr = spawn_app(CmsConfig::default()).await;

    let (status, body) = get(addr, "/healthz").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["templates"], 5);

    let (status, body) = get(addr, "/api/templates").await;
    assert_eq!(status, 200);
    assert_eq!(body.as_array().expect("template list").len(), 5);

    let (status, body) = get(addr, "/api/templates/public-facilities").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "public-facilities");
    assert_eq!(body["checksum"].as_str().expect("checksum").len(), 64);

    let (status, _) = get(addr, "/api/templates/nope").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn template_registration() {
    let addr = spawn_app(CmsConfig::default()).await;
    let definition = json!({
        "id": "bus-stops",
        "label": "バス停留所一覧",
        "fields": [
            { "key": "name", "type": "string", "required": true, "mandatory": true },
            { "key": "latitude", "type": "latitude" },
            { "key": "longitude", "type": "longitude" }
        ]
    });

    let (status, body) = post(addr, "/api/templates", definition.clone()).await;
    assert_eq!(status, 201);
    assert_eq!(body["fields"][1]["required"], false);

    let (status, body) = post(addr, "/api/templates", definition).await;
    assert_eq!(status, 409);
    assert!(body["errors"][0].as_str().expect("message").contains("bus-stops"));

    let (status, _) = post(addr, "/api/templates", json!({"id": "Bad Id", "label": "x", "fields": []})).await;
    assert_eq!(status, 400);

    let (_, body) = get(addr, "/healthz").await;
    assert_eq!(body["templates"], 6);
}

#[tokio::test]
async fn item_lifecycle() {
    let addr = spawn_app(CmsConfig::default()).await;
    let model_id = create_model(addr, "public-facilities").await;

    let (status, record) = post(addr, &format!("/api/models/{model_id}/items"), facility()).await;
    assert_eq!(status, 201);
    let record_id = record["id"].as_str().expect("record id").to_string();
    assert_eq!(record["name"], "中央図書館");

    let (status, items) = get(addr, &format!("/api/models/{model_id}/items")).await;
    assert_eq!(status, 200);
    assert_eq!(items.as_array().expect("items").len(), 1);

    let (status, item) = get(addr, &format!("/api/models/{model_id}/items/{record_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(item["identifier"], "fac-001");

    let (status, entity) = get(addr, &format!("/api/models/{model_id}/items/{record_id}/entity")).await;
    assert_eq!(status, 200);
    assert_eq!(entity["type"], "PublicFacilities");
    assert_eq!(entity["location"]["type"], "GeoProperty");

    let (status, package) = get(addr, &format!("/api/models/{model_id}/catalog")).await;
    assert_eq!(status, 200);
    assert_eq!(package["extras"][2]["value"], "1");
}

#[tokio::test]
async fn rejected_items_are_not_stored() {
    let addr = spawn_app(CmsConfig::default()).await;
    let model_id = create_model(addr, "public-facilities").await;

    let mut record = facility();
    record.as_object_mut().expect("object").remove("latitude");
    let (status, body) = post(addr, &format!("/api/models/{model_id}/items"), record).await;
    assert_eq!(status, 400);
    let errors: Vec<&str> = body["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(errors.iter().any(|e| e.starts_with("latitude: mandatory")));
    assert!(errors.iter().any(|e| e.starts_with("latitude: latitude and longitude")));

    let (status, _) = post(addr, &format!("/api/models/{model_id}/items"), json!(["not", "an", "object"])).await;
    assert_eq!(status, 400);

    let (_, items) = get(addr, &format!("/api/models/{model_id}/items")).await;
    assert!(items.as_array().expect("items").is_empty());
}

#[tokio::test]
async fn unknown_targets() {
    let addr = spawn_app(CmsConfig::default()).await;

    let (status, body) = post(addr, "/api/validate/no-such-template", facility()).await;
    assert_eq!(status, 404);
    assert_eq!(body["errors"], json!(["Unknown template"]));

    let (status, _) = post(addr, "/api/models", json!({"templateId": "no-such-template"})).await;
    assert_eq!(status, 404);

    let (status, _) = post(addr, "/api/models/missing/items", facility()).await;
    assert_eq!(status, 404);

    let (status, _) = get(addr, "/api/models/missing/catalog").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn dry_run_validation() {
    let addr = spawn_app(CmsConfig::default()).await;

    let (status, body) = post(addr, "/api/validate/public-facilities", facility()).await;
    assert_eq!(status, 200);
    assert_eq!(body["valid"], true);
    assert_eq!(body["record"]["latitude"], 35.6895);

    let mut zero = facility();
    zero["latitude"] = json!(0);
    zero["longitude"] = json!(0);
    let (status, body) = post(addr, "/api/validate/public-facilities", zero).await;
    assert_eq!(status, 400);
    assert_eq!(body["errors"].as_array().expect("errors").len(), 1);

    let (_, body) = get(addr, "/healthz").await;
    assert_eq!(body["models"], 0);
}

#[tokio::test]
async fn strict_unknown_fields() {
    let mut config = CmsConfig::default();
    config.validation.reject_unknown_fields = true;
    let addr = spawn_app(config).await;

    let mut record = facility();
    record["memo"] = json!("internal");
    let (status, body) = post(addr, "/api/validate/public-facilities", record).await;
    assert_eq!(status, 400);
    assert_eq!(body["errors"][0], "memo: field is not defined by the template");
}

#[tokio::test]
async fn malformed_bodies_use_error_shape() {
    let addr = spawn_app(CmsConfig::default()).await;

    let (status, body) = send_text(addr, "POST", "/api/models", Some("not json")).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
    assert_eq!(body["errors"].as_array().expect("errors").len(), 1);

    let (status, body) = post(addr, "/api/models", json!({})).await;
    assert_eq!(status, 400);
    assert!(body["errors"][0].as_str().expect("message").contains("templateId"));

    let (status, body) = send_text(addr, "POST", "/api/templates", Some("{\"id\": ")).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let (status, body) = post(addr, "/api/templates", json!({"id": "shops", "label": "Shops"})).await;
    assert_eq!(status, 400);
    assert!(body["errors"].is_array());
}

#[tokio::test]
async fn reserved_field_keys_are_rejected() {
    let addr = spawn_app(CmsConfig::default()).await;
    let definition = json!({
        "id": "shops",
        "label": "Shops",
        "fields": [
            { "key": "id", "type": "string" },
            { "key": "type", "type": "string" }
        ]
    });

    let (status, body) = post(addr, "/api/templates", definition).await;
    assert_eq!(status, 400);
    assert!(body["errors"][0].as_str().expect("message").contains("reserved"));

    let (status, _) = get(addr, "/api/templates/shops").await;
    assert_eq!(status, 404);
}
