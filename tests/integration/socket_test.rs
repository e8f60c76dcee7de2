//! Live WebSocket tests against a served router

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use roadrescue_live::backend::feed::LivePipeline;
use roadrescue_live::backend::realtime::{ChannelRegistry, Notifier};
use roadrescue_live::backend::routes::create_router;
use roadrescue_live::backend::server::AppState;
use roadrescue_live::shared::{NotificationPayload, NotificationTarget, RoomId};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Serve the router on an ephemeral port
async fn serve(pipeline: &LivePipeline) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(AppState::from_pipeline(pipeline));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/live", addr)).await.unwrap();
    client
}

/// Poll `check` until it holds
async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = tokio::time::timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {}", what);
}

/// Next text frame, decoded
async fn next_event(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no frame in time")
            .expect("connection ended")
            .expect("read failed");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

/// Whether the server ended the connection
async fn closed_by_server(client: &mut Client) -> bool {
    loop {
        match tokio::time::timeout(WAIT, client.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

async fn join(client: &mut Client, registry: &ChannelRegistry, room: &str) {
    let frame = json!({ "op": "join", "room": room }).to_string();
    client.send(Message::text(frame)).await.unwrap();
    let room = RoomId::new(room);
    let room = &room;
    eventually("room join", || async move { registry.room_size(room).await == 1 }).await;
}

#[tokio::test]
async fn test_bad_frame_gets_error_reply_and_connection_survives() {
    let pipeline = LivePipeline::disabled(ChannelRegistry::new(4));
    let registry = pipeline.registry().clone();
    let addr = serve(&pipeline).await;
    let mut client = connect(addr).await;

    client.send(Message::text("not json")).await.unwrap();
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "error");
    assert!(reply["data"]["message"].as_str().unwrap().contains("invalid command"));

    client.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "error");

    join(&mut client, &registry, "p1").await;
    let report = Notifier::new(registry.clone())
        .publish(
            NotificationPayload::service_request_updated(json!({ "requestId": "r1" })),
            &NotificationTarget::Room(RoomId::new("p1")),
        )
        .await;
    assert_eq!(report.delivered, 1);

    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "serviceRequestUpdated");
    assert_eq!(event["data"]["requestId"], "r1");
}

#[tokio::test]
async fn test_closing_socket_leaves_every_room() {
    let pipeline = LivePipeline::disabled(ChannelRegistry::new(4));
    let registry = pipeline.registry().clone();
    let addr = serve(&pipeline).await;
    let mut client = connect(addr).await;

    join(&mut client, &registry, "p1").await;
    join(&mut client, &registry, "p2").await;
    assert_eq!(registry.room_count().await, 2);

    client.close(None).await.unwrap();

    let registry = &registry;
    eventually("subscriber removal", || async move {
        registry.subscriber_count().await == 0 && registry.room_count().await == 0
    })
    .await;
}

#[tokio::test]
async fn test_shutdown_closes_connected_sockets() {
    let pipeline = LivePipeline::disabled(ChannelRegistry::new(4));
    let registry = pipeline.registry().clone();
    let addr = serve(&pipeline).await;
    let mut client = connect(addr).await;
    join(&mut client, &registry, "p1").await;

    pipeline.shutdown().await;

    assert!(closed_by_server(&mut client).await);
    assert_eq!(registry.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_connection_after_shutdown_is_closed() {
    let pipeline = LivePipeline::disabled(ChannelRegistry::new(4));
    let registry = pipeline.registry().clone();
    let addr = serve(&pipeline).await;
    pipeline.shutdown().await;

    let mut client = connect(addr).await;
    assert!(closed_by_server(&mut client).await);
    assert_eq!(registry.subscriber_count().await, 0);
}
