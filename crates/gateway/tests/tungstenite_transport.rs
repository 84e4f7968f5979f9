//! Session round trip over a real local WebSocket server.

use std::{sync::Arc, time::Duration};

use {
    beacon_config::PresenceConfig,
    beacon_gateway::{
        ConnectionSupervisor, CredentialRegistry, GatewaySettings, PresenceSpec, Target,
        TerminalReason, TungsteniteConnector,
    },
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    tokio::net::{TcpListener, TcpStream},
    tokio_tungstenite::{
        WebSocketStream, accept_async,
        tungstenite::{
            Message,
            protocol::{CloseFrame, frame::coding::CloseCode},
        },
    },
};

const TOKEN: &str = "websocket-test-token";

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended early: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_session_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let identify = next_json(&mut ws).await;
        ws.send(Message::Text(
            json!({ "op": 10, "d": { "heartbeat_interval": 50 } })
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

        let mut ops = Vec::new();
        while !(ops.contains(&1) && ops.contains(&3)) {
            let frame = next_json(&mut ws).await;
            ops.push(frame["op"].as_u64().unwrap());
        }

        ws.send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(4004),
            reason: "Authentication failed.".to_string().into(),
        })))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        (identify, ops)
    });

    let spec = PresenceSpec::from_config(&PresenceConfig {
        name: "Chess".into(),
        ..Default::default()
    })
    .unwrap();
    let settings = GatewaySettings {
        url: format!("ws://{addr}"),
        presence_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let supervisor = ConnectionSupervisor::new(
        CredentialRegistry::new([TOKEN]),
        spec,
        settings,
        Arc::new(TungsteniteConnector::new()),
    );
    supervisor.start(&Target::All).await.unwrap();

    let (identify, ops) = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TOKEN);
    assert_eq!(identify["d"]["properties"]["browser"], "Chrome");
    assert!(ops.contains(&1));
    assert!(ops.contains(&3));

    tokio::time::timeout(Duration::from_secs(5), async {
        while supervisor.is_running().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let id = supervisor.credentials().ids().next().unwrap();
    assert_eq!(
        supervisor.last_termination(id),
        Some(TerminalReason::Fatal(4004))
    );
}

#[tokio::test]
async fn test_connect_refused_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    use beacon_gateway::transport::Connector;
    let result = TungsteniteConnector::new()
        .connect(&format!("ws://{addr}"))
        .await;
    assert!(matches!(result, Err(beacon_gateway::Error::WebSocket(_))));
}
