use std::fmt::Debug;

use actix_web::{web, App};
use awc::error::WsProtocolError;
use awc::ws;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use hub::handlers::root;
use hub::hub::spawn_hub_with;
use hub::hub_state::HubState;
use protocol::{ClientMessage, CursorPosition, SequentialIdentity, ServerMessage};

fn start_hub() -> actix_test::TestServer {
    let hub_tx = spawn_hub_with(HubState::with_identity(Box::new(SequentialIdentity::new())));
    actix_test::start(move || {
        App::new()
            .app_data(web::Data::new(hub_tx.clone()))
            .configure(root)
    })
}

async fn next_message<S>(channel: &mut S) -> ServerMessage
where
    S: Stream<Item = Result<ws::Frame, WsProtocolError>> + Unpin,
{
    loop {
        match channel.next().await {
            Some(Ok(ws::Frame::Text(bytes))) => {
                let text = std::str::from_utf8(&bytes).expect("utf-8 frame");
                return ServerMessage::parse(text).expect("valid message");
            }
            Some(Ok(ws::Frame::Ping(_))) | Some(Ok(ws::Frame::Pong(_))) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

async fn send<S>(channel: &mut S, message: ClientMessage)
where
    S: Sink<ws::Message> + Unpin,
    S::Error: Debug,
{
    let text = message.encode().expect("");
    channel
        .send(ws::Message::Text(text.into()))
        .await
        .expect("send");
}

#[actix_rt::test]
async fn it_runs_join_edit_point_leave_scenario() {
    let mut srv = start_hub();

    let mut a = srv.ws_at("/").await.expect("a connects");
    match next_message(&mut a).await {
        ServerMessage::Init {
            data,
            cursors,
            client_id,
        } => {
            assert_eq!(data, "");
            assert_eq!(client_id.as_deref(), Some("client-1"));
            assert_eq!(cursors.len(), 1);
        }
        other => panic!("unexpected message: {:?}", other),
    }

    send(
        &mut a,
        ClientMessage::Update {
            data: "hello".into(),
        },
    )
    .await;
    assert_eq!(
        next_message(&mut a).await,
        ServerMessage::Update {
            data: "hello".into()
        }
    );

    let mut b = srv.ws_at("/").await.expect("b connects");
    match next_message(&mut b).await {
        ServerMessage::Init {
            data,
            cursors,
            client_id,
        } => {
            assert_eq!(data, "hello");
            assert_eq!(client_id.as_deref(), Some("client-2"));
            assert!(cursors.contains_key("client-1"));
            assert!(cursors.contains_key("client-2"));
        }
        other => panic!("unexpected message: {:?}", other),
    }

    send(
        &mut a,
        ClientMessage::Cursor {
            client_id: "client-1".into(),
            position: CursorPosition::new(3.0, 3.0),
        },
    )
    .await;
    for channel in [&mut a, &mut b] {
        match next_message(channel).await {
            ServerMessage::Cursor { cursors } => {
                let record = &cursors["client-1"];
                assert_eq!(record.position(), CursorPosition::new(3.0, 3.0));
                assert_eq!(record.color, "red");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    b.send(ws::Message::Close(None)).await.expect("close b");
    drop(b);
    match next_message(&mut a).await {
        ServerMessage::Cursor { cursors } => {
            assert!(cursors.contains_key("client-1"));
            assert!(!cursors.contains_key("client-2"));
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[actix_rt::test]
async fn it_swallows_malformed_payloads() {
    let mut srv = start_hub();
    let mut a = srv.ws_at("/").await.expect("a connects");
    next_message(&mut a).await;

    a.send(ws::Message::Text("{\"type\":".into()))
        .await
        .expect("send");
    a.send(ws::Message::Text(r#"{"type":"shout","data":"?"}"#.into()))
        .await
        .expect("send");
    send(
        &mut a,
        ClientMessage::Update {
            data: "after garbage".into(),
        },
    )
    .await;

    assert_eq!(
        next_message(&mut a).await,
        ServerMessage::Update {
            data: "after garbage".into()
        }
    );
}

#[actix_rt::test]
async fn it_accepts_json_in_binary_frames() {
    let mut srv = start_hub();
    let mut a = srv.ws_at("/").await.expect("a connects");
    next_message(&mut a).await;

    let payload = web::Bytes::from_static(br#"{"type":"update","data":"binary"}"#);
    a.send(ws::Message::Binary(payload)).await.expect("send");

    assert_eq!(
        next_message(&mut a).await,
        ServerMessage::Update {
            data: "binary".into()
        }
    );
}
