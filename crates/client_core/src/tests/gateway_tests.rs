use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::error::FailureKind;
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;

use super::*;
use shared::domain::{InputId, LayerDraft, LayerId, LayerPatch, Position, ScreenId, Size};

const GUID: &str = "{7e9cd858-780b-40d1-9f20-0fa0d53a06ce}";

async fn spawn_controller(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn gateway_for(base: &str) -> CoexGateway {
    let config = GatewayConfig {
        base_url: Url::parse(&format!("{base}/api/v1/")).expect("base url"),
        request_timeout: Duration::from_secs(2),
    };
    CoexGateway::new(config).expect("gateway")
}

#[derive(Clone, Default)]
struct Captured(Arc<AsyncMutex<Vec<Value>>>);

async fn capture_ok(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    captured.0.lock().await.push(body);
    Json(json!({ "code": 0 }))
}

#[tokio::test]
async fn brightness_body_targets_screen_id_list() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/v1/screen/brightness", put(capture_ok))
        .with_state(captured.clone());
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    gateway
        .set_brightness(&ScreenId::new(GUID), 75)
        .await
        .expect("brightness");

    let bodies = captured.0.lock().await;
    assert_eq!(
        bodies.as_slice(),
        [json!({ "screenIdList": [GUID], "brightness": 75 })]
    );
}

#[tokio::test]
async fn nonzero_envelope_code_becomes_rejected_with_vendor_message() {
    let app = Router::new().route(
        "/api/v1/screen/brightness",
        put(|| async { Json(json!({ "code": 1, "message": "bad request" })) }),
    );
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    let err = gateway
        .set_brightness(&ScreenId::new(GUID), 10)
        .await
        .expect_err("must fail");
    match err {
        Failure::Rejected {
            endpoint,
            code,
            message,
        } => {
            assert_eq!(endpoint, "screen/brightness");
            assert_eq!(code, 1);
            assert_eq!(message, "bad request");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn layer_endpoint_404_is_unsupported_but_other_404_is_rejected() {
    // No routes at all: every endpoint answers 404.
    let base = spawn_controller(Router::new()).await;
    let gateway = gateway_for(&base);
    let screen = ScreenId::new(GUID);

    let draft = LayerDraft {
        name: None,
        position: Position::new(0, 0),
        size: Size::new(400, 300),
        z_order: 1,
        input: None,
    };
    let err = gateway
        .create_layer(&screen, &draft)
        .await
        .expect_err("no layer endpoint");
    assert_eq!(err.kind(), FailureKind::Unsupported);

    let err = gateway
        .set_gamma(&screen, 2.2)
        .await
        .expect_err("no gamma endpoint");
    assert!(matches!(err, Failure::Rejected { code: 404, .. }));
}

#[tokio::test]
async fn slow_controller_resolves_to_network_failure() {
    let app = Router::new().route(
        "/api/v1/screen",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "code": 0 }))
        }),
    );
    let base = spawn_controller(app).await;
    let config = GatewayConfig {
        base_url: Url::parse(&format!("{base}/api/v1/")).expect("base url"),
        request_timeout: Duration::from_millis(200),
    };
    let gateway = CoexGateway::new(config).expect("gateway");

    let err = gateway
        .fetch_screen_snapshot(&ScreenId::new(GUID))
        .await
        .expect_err("must time out");
    assert_eq!(err.kind(), FailureKind::Network);
}

#[tokio::test]
async fn garbage_body_resolves_to_protocol_failure() {
    let app = Router::new().route("/api/v1/screen", get(|| async { "not an envelope" }));
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    let err = gateway
        .fetch_screen_snapshot(&ScreenId::new(GUID))
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), FailureKind::Protocol);
}

#[tokio::test]
async fn snapshot_normalizes_flat_layer_shape() {
    let app = Router::new().route(
        "/api/v1/screen",
        get(|| async {
            Json(json!({
                "code": 0,
                "data": {
                    "id": GUID,
                    "name": "Main Wall",
                    "brightness": 80,
                    "gamma": 2.6,
                    "displayMode": 1,
                    "layers": [
                        { "id": "5", "name": "pip", "x": 100, "y": 100,
                          "width": 400, "height": 300, "zOrder": 2, "inputId": "7" },
                        { "id": 6, "x": -20, "y": 0, "locked": true }
                    ],
                    "cabinets": [
                        { "id": 1, "x": 0, "y": 0, "width": 256, "height": 256 },
                        { "id": 2, "x": 256, "y": 0, "width": 256, "height": 256 }
                    ]
                }
            }))
        }),
    );
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    let screen = gateway
        .fetch_screen_snapshot(&ScreenId::new("fallback"))
        .await
        .expect("snapshot");

    assert_eq!(screen.id, ScreenId::new(GUID));
    assert_eq!(screen.brightness, 80);
    assert_eq!(screen.display_mode, shared::domain::DisplayMode::Freeze);
    assert_eq!(screen.layers.len(), 2);

    let pip = &screen.layers[0];
    assert_eq!(pip.id, LayerId(5));
    assert_eq!(pip.position, Position::new(100, 100));
    assert_eq!(pip.size, Size::new(400, 300));
    assert_eq!(pip.input, Some(InputId(7)));

    // Defaults and clamping for the sparse layer.
    let sparse = &screen.layers[1];
    assert_eq!(sparse.position, Position::new(0, 0));
    assert_eq!(sparse.size, Size::new(200, 150));
    assert_eq!(sparse.z_order, 1);
    assert!(sparse.locked);

    assert_eq!(
        shared::domain::canvas_extent(&screen.cabinets),
        Size::new(512, 256)
    );
}

#[tokio::test]
async fn snapshot_selects_matching_working_mode_group() {
    let app = Router::new().route(
        "/api/v1/screen",
        get(|| async {
            Json(json!({
                "code": 0,
                "data": {
                    "id": GUID,
                    "workingMode": "live",
                    "workingModeList": [
                        { "workingMode": "preview",
                          "layers": [ { "id": 1, "x": 0, "y": 0 } ] },
                        { "workingMode": "live",
                          "layers": [ { "id": 2, "x": 10, "y": 10 },
                                      { "id": 3, "x": 20, "y": 20 } ] }
                    ]
                }
            }))
        }),
    );
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    let screen = gateway
        .fetch_screen_snapshot(&ScreenId::new(GUID))
        .await
        .expect("snapshot");
    let ids: Vec<i64> = screen.layers.iter().map(|l| l.id.0).collect();
    assert_eq!(ids, [2, 3]);
}

#[tokio::test]
async fn partial_update_merges_over_current_values() {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api/v1/screen",
            get(|| async {
                Json(json!({
                    "code": 0,
                    "data": {
                        "id": GUID,
                        "layers": [
                            { "id": 5, "name": "pip", "x": 10, "y": 20,
                              "width": 300, "height": 200, "zOrder": 2, "inputId": 7 }
                        ]
                    }
                }))
            }),
        )
        .route("/api/v1/screen/layer", put(capture_ok))
        .with_state(captured.clone());
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);
    let screen = ScreenId::new(GUID);

    // No snapshot cached yet: the gateway must fetch before merging.
    let patch = LayerPatch {
        position: Some(Position::new(50, 60)),
        ..Default::default()
    };
    let updated = gateway
        .update_layer(&screen, LayerId(5), &patch)
        .await
        .expect("update");

    assert_eq!(updated.position, Position::new(50, 60));
    assert_eq!(updated.size, Size::new(300, 200));

    let bodies = captured.0.lock().await;
    assert_eq!(
        bodies.as_slice(),
        [json!({
            "screenID": GUID,
            "layer": {
                "id": "5",
                "name": "pip",
                "x": 50,
                "y": 60,
                "width": 300,
                "height": 200,
                "zOrder": 2,
                "inputId": "7"
            }
        })]
    );
}

#[tokio::test]
async fn input_switch_sends_string_id_pairs_under_screen_id() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/v1/screen/layer/input", put(capture_ok))
        .with_state(captured.clone());
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    gateway
        .switch_layer_input(&ScreenId::new(GUID), LayerId(3), InputId(2))
        .await
        .expect("switch");

    let bodies = captured.0.lock().await;
    assert_eq!(
        bodies.as_slice(),
        [json!({
            "screenID": GUID,
            "layers": [ { "id": "3", "source": "2" } ]
        })]
    );
}

#[tokio::test]
async fn created_layer_geometry_survives_the_snapshot_round_trip() {
    #[derive(Clone, Default)]
    struct Stored(Arc<AsyncMutex<Vec<Value>>>);

    async fn create(State(stored): State<Stored>, Json(body): Json<Value>) -> Json<Value> {
        let mut layer = body["layer"].clone();
        // Server assigns the id; client fields survive otherwise.
        layer["id"] = json!(42);
        stored.0.lock().await.push(layer.clone());
        Json(json!({ "code": 0, "data": layer }))
    }

    async fn screen(State(stored): State<Stored>) -> Json<Value> {
        let layers = stored.0.lock().await.clone();
        Json(json!({ "code": 0, "data": { "id": GUID, "layers": layers } }))
    }

    let stored = Stored::default();
    let app = Router::new()
        .route("/api/v1/screen/layer", post(create))
        .route("/api/v1/screen", get(screen))
        .with_state(stored);
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);
    let target = ScreenId::new(GUID);

    let draft = LayerDraft {
        name: Some("HDMI 1 Layer".to_string()),
        position: Position::new(100, 100),
        size: Size::new(400, 300),
        z_order: 1,
        input: Some(InputId(1)),
    };
    let created = gateway.create_layer(&target, &draft).await.expect("create");
    assert_eq!(created.id, LayerId(42));

    let snapshot = gateway
        .fetch_screen_snapshot(&target)
        .await
        .expect("snapshot");
    let found = snapshot
        .layers
        .iter()
        .find(|l| l.id == created.id)
        .expect("created layer in snapshot");
    assert_eq!(found.position, Position::new(100, 100));
    assert_eq!(found.size, Size::new(400, 300));
}

#[tokio::test]
async fn input_sources_normalize_status_and_resolution() {
    let app = Router::new().route(
        "/api/v1/device/input/sources",
        get(|| async {
            Json(json!({
                "code": 0,
                "data": [
                    { "id": 1, "name": "HDMI 1", "type": "HDMI",
                      "resolution": "1920x1080", "status": "active" },
                    { "id": "2", "status": "inactive" },
                    { "id": 3, "status": "warming-up" }
                ]
            }))
        }),
    );
    let base = spawn_controller(app).await;
    let gateway = gateway_for(&base);

    let inputs = gateway.list_input_sources().await.expect("inputs");
    assert_eq!(inputs.len(), 3);
    assert_eq!(inputs[0].status, shared::domain::InputStatus::Active);
    assert_eq!(inputs[0].resolution.as_deref(), Some("1920x1080"));
    assert_eq!(inputs[1].id, InputId(2));
    assert_eq!(inputs[1].status, shared::domain::InputStatus::Inactive);
    assert_eq!(inputs[1].resolution, None);
    assert_eq!(inputs[2].status, shared::domain::InputStatus::Unknown);
}
