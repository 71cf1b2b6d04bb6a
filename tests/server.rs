use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use roomhub::{AppState, Config, app};
use serde_json::{Value, json};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(extra: &[&str]) -> Result<SocketAddr> {
    let mut args = vec!["roomhub", "--room-lifetime", "0", "--client-buffer", "4"];
    args.extend_from_slice(extra);
    let config = Config::try_parse_from(args)?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = app(AppState::new(&config), &config)?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(addr)
}

async fn create_room(addr: SocketAddr, name: &str) -> Result<String> {
    let room: Value = reqwest::Client::new()
        .post(format!("http://{addr}/createroom"))
        .json(&json!({ "name": name, "discription": "test room" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    assert_eq!(room["roomName"], name);
    assert_eq!(room["discription"], "test room");
    Ok(room["roomID"].as_str().expect("roomID is a string").to_owned())
}

async fn rooms(addr: SocketAddr) -> Result<Vec<Value>> {
    Ok(reqwest::get(format!("http://{addr}/rooms")).await?.json().await?)
}

async fn wait_members(addr: SocketAddr, room_id: &str, n: u64) -> Result<()> {
    timeout(Duration::from_secs(2), async {
        loop {
            let rooms = rooms(addr).await?;
            let room = rooms.iter().find(|room| room["roomID"] == room_id);
            if room.is_some_and(|room| room["members"] == n) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?
}

async fn connect(addr: SocketAddr, room_id: &str, user: &str) -> Result<Socket> {
    let (socket, _) = connect_async(format!("ws://{addr}/ws/{room_id}?userID={user}")).await?;
    Ok(socket)
}

async fn next_text(socket: &mut Socket) -> Result<String> {
    let msg = timeout(Duration::from_secs(1), socket.next())
        .await?
        .expect("socket open")?;
    Ok(msg.into_text()?.as_str().to_owned())
}

#[tokio::test]
async fn lobby_broadcast_skips_sender() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let room = create_room(addr, "lobby").await?;

    let mut u1 = connect(addr, &room, "U1").await?;
    let mut u2 = connect(addr, &room, "U2").await?;
    let mut u3 = connect(addr, &room, "U3").await?;
    wait_members(addr, &room, 3).await?;

    u1.send(Message::text("hi")).await?;
    assert_eq!(next_text(&mut u2).await?, "hi");
    assert_eq!(next_text(&mut u3).await?, "hi");

    u2.send(Message::text("yo")).await?;
    assert_eq!(next_text(&mut u1).await?, "yo");
    assert_eq!(next_text(&mut u3).await?, "yo");

    let listed = rooms(addr).await?;
    let lobby = listed.iter().find(|r| r["roomID"] == room.as_str()).expect("listed");
    assert_eq!(lobby["existclients"], json!({ "U1": true, "U2": true, "U3": true }));

    u3.close(None).await?;
    wait_members(addr, &room, 2).await?;
    Ok(())
}

#[tokio::test]
async fn echo_mode_delivers_to_sender() -> Result<()> {
    let addr = spawn_server(&["--echo-to-sender", "true"]).await?;
    let room = create_room(addr, "echo").await?;

    let mut u1 = connect(addr, &room, "U1").await?;
    let mut u2 = connect(addr, &room, "U2").await?;
    wait_members(addr, &room, 2).await?;

    u1.send(Message::text("hi")).await?;
    assert_eq!(next_text(&mut u1).await?, "hi");
    assert_eq!(next_text(&mut u2).await?, "hi");
    Ok(())
}

#[tokio::test]
async fn binary_frames_pass_through() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let room = create_room(addr, "bytes").await?;

    let mut u1 = connect(addr, &room, "U1").await?;
    let mut u2 = connect(addr, &room, "U2").await?;
    wait_members(addr, &room, 2).await?;

    u1.send(Message::binary(vec![1u8, 2, 3])).await?;
    let msg = timeout(Duration::from_secs(1), u2.next())
        .await?
        .expect("socket open")?;
    assert_eq!(msg.into_data().as_ref(), [1u8, 2, 3]);

    let history: Vec<Value> = reqwest::get(format!("http://{addr}/rooms/{room}/messages"))
        .await?
        .json()
        .await?;
    assert_eq!(history[0]["data"], "AQID");
    Ok(())
}

#[tokio::test]
async fn history_lists_delivered_messages() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let room = create_room(addr, "logged").await?;

    let mut u1 = connect(addr, &room, "U1").await?;
    let mut u2 = connect(addr, &room, "U2").await?;
    wait_members(addr, &room, 2).await?;

    u1.send(Message::text("hi")).await?;
    assert_eq!(next_text(&mut u2).await?, "hi");
    u2.send(Message::text("yo")).await?;
    assert_eq!(next_text(&mut u1).await?, "yo");

    let history: Vec<Value> = reqwest::get(format!("http://{addr}/rooms/{room}/messages"))
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(history[0]["userId"], "U1");
    assert_eq!(history[0]["data"], "hi");
    assert_eq!(history[0]["roomID"], room.as_str());
    Ok(())
}

#[tokio::test]
async fn anonymous_users_get_an_alias() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let room = create_room(addr, "anon").await?;

    let (_socket, _) = connect_async(format!("ws://{addr}/ws/{room}")).await?;
    wait_members(addr, &room, 1).await?;

    let listed = rooms(addr).await?;
    let present = listed[0]["existclients"].as_object().expect("presence map");
    assert_eq!(present.len(), 1);
    assert!(present.keys().all(|alias| !alias.is_empty()));
    Ok(())
}

#[tokio::test]
async fn unknown_room_is_not_found() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let missing = Uuid::now_v7();

    match connect_async(format!("ws://{addr}/ws/{missing}?userID=U1")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
        Err(other) => panic!("expected 404, got {other:?}"),
        Ok(_) => panic!("expected 404, got an upgrade"),
    }

    let status = reqwest::get(format!("http://{addr}/rooms/{missing}/messages"))
        .await?
        .status();
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn malformed_create_is_rejected() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let client = reqwest::Client::new();

    let not_json = client
        .post(format!("http://{addr}/createroom"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert!(not_json.status().is_client_error());

    let no_name = client
        .post(format!("http://{addr}/createroom"))
        .json(&json!({ "discription": "nameless" }))
        .send()
        .await?;
    assert!(no_name.status().is_client_error());

    assert!(rooms(addr).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn reuse_returns_existing_room() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let room: Value = client
            .post(format!("http://{addr}/createroom"))
            .json(&json!({ "roomName": "shared", "reuse": true }))
            .send()
            .await?
            .json()
            .await?;
        ids.push(room["roomID"].clone());
    }

    assert_eq!(ids[0], ids[1]);
    let listed: Vec<Value> = reqwest::get(format!("http://{addr}/getRooms")).await?.json().await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn session_ids_are_fresh() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let a: Uuid = reqwest::get(format!("http://{addr}/sessionid")).await?.json().await?;
    let b: Uuid = reqwest::get(format!("http://{addr}/sessionid")).await?.json().await?;
    assert_ne!(a, b);
    Ok(())
}

#[tokio::test]
async fn responses_carry_a_request_id() -> Result<()> {
    let addr = spawn_server(&[]).await?;
    let client = reqwest::Client::new();

    let fresh = client.get(format!("http://{addr}/rooms")).send().await?;
    let id = fresh.headers().get("x-request-id").expect("generated id").to_str()?;
    Uuid::parse_str(id)?;

    let echoed = client
        .get(format!("http://{addr}/rooms"))
        .header("x-request-id", "trace-me")
        .send()
        .await?;
    assert_eq!(echoed.headers()["x-request-id"], "trace-me");
    Ok(())
}
