//! Concurrency properties: rooms run in parallel and independently, and
//! events from one socket are observed in order.

use maze_hunt_server::config::Config;
use maze_hunt_server::protocol::{ClientEvent, ServerEvent, SocketId};
use maze_hunt_server::room::runtime::RoomMsg;
use maze_hunt_server::websocket::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.game.round_end_duration_ms = 50;
    cfg.game.position_update_interval_ms = 0;
    cfg.game.respawn_grace_ms = 0;
    cfg.game.sinkhole_min_interval_ms = 60_000;
    cfg.game.sinkhole_max_interval_ms = 61_000;
    cfg.logging.enable_file_logging = false;
    cfg
}

fn connect(state: &Arc<AppState>) -> (SocketId, mpsc::Receiver<Arc<ServerEvent>>) {
    let socket_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(512);
    state
        .hub
        .register_socket(socket_id, tx, "127.0.0.1:0".parse().unwrap());
    (socket_id, rx)
}

async fn expect<F>(
    rx: &mut mpsc::Receiver<Arc<ServerEvent>>,
    what: &str,
    pred: F,
) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            panic!("timeout waiting for {what}");
        }
        match tokio::time::timeout(deadline - now, rx.recv()).await {
            Ok(Some(ev)) => {
                if pred(&ev) {
                    return (*ev).clone();
                }
            }
            Ok(None) => panic!("channel closed waiting for {what}"),
            Err(_) => panic!("timeout waiting for {what}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn many_rooms_run_in_parallel() {
    let state = AppState::new(test_config());

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let (socket_id, mut rx) = connect(&state);
            let (code, tx) = state
                .store
                .create_room(4, None, state.runtime_deps())
                .expect("create");
            tx.send(RoomMsg::Join {
                socket_id,
                player_name: Some(format!("Host{i}")),
            })
            .await
            .unwrap();
            let created = expect(&mut rx, "room_created", |e| {
                matches!(e, ServerEvent::RoomCreated { .. })
            })
            .await;
            let ServerEvent::RoomCreated { room_code, .. } = created else {
                unreachable!()
            };
            assert_eq!(room_code, code);
            code
        }));
    }

    let mut codes = std::collections::HashSet::new();
    for handle in handles {
        codes.insert(handle.await.expect("room task"));
    }
    assert_eq!(codes.len(), 8, "eight distinct room codes");
    assert_eq!(state.store.len(), 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn events_do_not_cross_rooms() {
    let state = AppState::new(test_config());

    // Two independent rooms with one member each.
    let (socket_a, mut rx_a) = connect(&state);
    let (code_a, tx_a) = state
        .store
        .create_room(4, None, state.runtime_deps())
        .unwrap();
    tx_a.send(RoomMsg::Join {
        socket_id: socket_a,
        player_name: Some("A".into()),
    })
    .await
    .unwrap();
    expect(&mut rx_a, "created A", |e| {
        matches!(e, ServerEvent::RoomCreated { .. })
    })
    .await;

    let (socket_b, mut rx_b) = connect(&state);
    let (code_b, tx_b) = state
        .store
        .create_room(4, None, state.runtime_deps())
        .unwrap();
    tx_b.send(RoomMsg::Join {
        socket_id: socket_b,
        player_name: Some("B".into()),
    })
    .await
    .unwrap();
    expect(&mut rx_b, "created B", |e| {
        matches!(e, ServerEvent::RoomCreated { .. })
    })
    .await;

    assert_ne!(code_a, code_b);

    // Starting room A's game floods room A with events; room B sees none
    // of them.
    tx_a.send(RoomMsg::Client {
        socket_id: socket_a,
        event: ClientEvent::StartGame {},
    })
    .await
    .unwrap();
    expect(&mut rx_a, "A game_started", |e| {
        matches!(e, ServerEvent::GameStarted {})
    })
    .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut leaked = 0;
    while let Ok(ev) = rx_b.try_recv() {
        if !matches!(ev.as_ref(), ServerEvent::RoomUpdate { .. }) {
            leaked += 1;
        }
    }
    assert_eq!(leaked, 0, "room B observed room A's events");
}

#[tokio::test(flavor = "multi_thread")]
async fn position_updates_from_one_socket_stay_ordered() {
    let state = AppState::new(test_config());

    // Build a two-player room and play through to the hunt.
    let (socket_host, mut rx_host) = connect(&state);
    let (_code, tx) = state
        .store
        .create_room(4, None, state.runtime_deps())
        .unwrap();
    tx.send(RoomMsg::Join {
        socket_id: socket_host,
        player_name: Some("Mover".into()),
    })
    .await
    .unwrap();
    let created = expect(&mut rx_host, "created", |e| {
        matches!(e, ServerEvent::RoomCreated { .. })
    })
    .await;
    let ServerEvent::RoomCreated {
        player_id: mover_id,
        ..
    } = created
    else {
        unreachable!()
    };

    let (socket_obs, mut rx_obs) = connect(&state);
    tx.send(RoomMsg::Join {
        socket_id: socket_obs,
        player_name: Some("Observer".into()),
    })
    .await
    .unwrap();
    expect(&mut rx_obs, "joined", |e| {
        matches!(e, ServerEvent::RoomJoined { .. })
    })
    .await;

    tx.send(RoomMsg::Client {
        socket_id: socket_host,
        event: ClientEvent::StartGame {},
    })
    .await
    .unwrap();

    // Answer both entry quizzes (correctness is irrelevant here).
    for (socket_id, rx) in [(socket_host, &mut rx_host), (socket_obs, &mut rx_obs)] {
        let blitz = expect(rx, "blitz_start", |e| {
            matches!(e, ServerEvent::BlitzStart { .. })
        })
        .await;
        let ServerEvent::BlitzStart { questions, .. } = blitz else {
            unreachable!()
        };
        for question_index in 0..questions.len() {
            tx.send(RoomMsg::Client {
                socket_id,
                event: ClientEvent::BlitzAnswer {
                    question_index,
                    answer_index: 0,
                },
            })
            .await
            .unwrap();
            expect(rx, "answer result", |e| {
                matches!(e, ServerEvent::BlitzAnswerResult { .. })
            })
            .await;
        }
    }
    expect(&mut rx_obs, "hunt_start", |e| {
        matches!(e, ServerEvent::HuntStart { .. })
    })
    .await;

    // The mover walks along row 0; with throttling disabled every report
    // is accepted. The observer must see the columns in send order.
    let total = 20;
    for col in 1..=total {
        tx.send(RoomMsg::Client {
            socket_id: socket_host,
            event: ClientEvent::UpdatePosition {
                x: (f64::from(col) + 0.5) * 40.0,
                y: 20.0,
                row: 0,
                col,
            },
        })
        .await
        .unwrap();
    }

    let mut seen = Vec::new();
    while seen.len() < total as usize {
        let ev = expect(&mut rx_obs, "position update", |e| {
            matches!(e, ServerEvent::PlayerPositionUpdate { player_id, .. } if *player_id == mover_id)
        })
        .await;
        let ServerEvent::PlayerPositionUpdate { position, .. } = ev else {
            unreachable!()
        };
        seen.push(position.col);
    }
    let expected: Vec<i32> = (1..=total).collect();
    assert_eq!(seen, expected, "per-receiver order matches send order");
}
