//! WebSocket host over the scripted engine.
//!
//! Run with: cargo run -p ws-host-demo
//!
//! Then connect to ws://127.0.0.1:3000/ws and send commands such as
//! `{"type": "init"}` and `{"type": "process_key", "input": "nihao"}`.
//! `RIME_BRIDGE_ADDR` overrides the listen address.

use std::{net::SocketAddr, sync::Arc};

use rime_bridge_core::{
    EventSink, EventStore,
    engine::{SchemaInfo, SwitchGroup, SwitchInfo},
    testing::ScriptedEngine,
};
use rime_bridge_session::{Bridge, BridgeConfig};
use rime_bridge_transport::{
    logging::init_tracing,
    websocket::{WsState, create_ws_router},
};

fn demo_engine() -> ScriptedEngine {
    let engine = ScriptedEngine::new();
    engine.script_candidates(["你好", "你", "妳", "擬", "泥", "尼", "呢"]);
    engine.script_comment(0, "nǐ hǎo");
    engine.script_schemas(Some(vec![SchemaInfo {
        id: "luna_pinyin".to_string(),
        name: "朙月拼音".to_string(),
    }]));
    engine.script_switches(Some(vec![SwitchGroup {
        is_radio: false,
        current_index: 0,
        reset_index: 0,
        switches: vec![
            SwitchInfo {
                name: "ascii_mode".to_string(),
                label: "中文".to_string(),
                abbrev: "中".to_string(),
            },
            SwitchInfo {
                name: "ascii_mode".to_string(),
                label: "西文".to_string(),
                abbrev: "A".to_string(),
            },
        ],
    }]));
    engine
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let addr: SocketAddr = std::env::var("RIME_BRIDGE_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

    let events = Arc::new(EventStore::new());
    let bridge = Bridge::new(
        Arc::new(demo_engine()),
        Arc::clone(&events) as Arc<dyn EventSink>,
        BridgeConfig::from_env(),
    );
    tracing::info!(bridge = %bridge.id(), "bridge created");

    let app = axum::Router::new().merge(create_ws_router(WsState::new(bridge, events)));

    tracing::info!("Bridge listening on ws://{addr}/ws");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
