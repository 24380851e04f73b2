//! Integration tests driving room runtimes through their real message
//! inboxes, with test sockets registered on the hub.

use maze_hunt_server::config::Config;
use maze_hunt_server::protocol::{
    ClientEvent, CoinView, PlayerId, PlayerState, PositionPayload, RoomPhase, ServerEvent,
    SinkholeView, SocketId,
};
use maze_hunt_server::quiz::fallback::local_pool;
use maze_hunt_server::room::runtime::RoomMsg;
use maze_hunt_server::websocket::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

const CELL: f64 = 40.0;

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.game.blitz_duration_ms = 5_000;
    cfg.game.round_end_duration_ms = 50;
    cfg.game.hunt_duration_ms = 8_000;
    cfg.game.game_total_duration_ms = 60_000;
    cfg.game.reconnect_grace_ms = 500;
    cfg.game.iframe_duration_ms = 200;
    cfg.game.collision_cooldown_ms = 100;
    cfg.game.knockback_enabled = false;
    cfg.game.position_update_interval_ms = 10;
    cfg.game.respawn_grace_ms = 30;
    cfg.game.sinkhole_min_interval_ms = 60_000;
    cfg.game.sinkhole_max_interval_ms = 61_000;
    cfg.game.teleport_cooldown_ms = 100;
    cfg.game.coin_respawn_ms = 150;
    cfg.logging.enable_file_logging = false;
    cfg
}

struct Client {
    socket_id: SocketId,
    player_id: PlayerId,
    rx: mpsc::Receiver<Arc<ServerEvent>>,
}

fn connect(state: &Arc<AppState>) -> (SocketId, mpsc::Receiver<Arc<ServerEvent>>) {
    let socket_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(256);
    state
        .hub
        .register_socket(socket_id, tx, "127.0.0.1:0".parse().unwrap());
    (socket_id, rx)
}

/// Receive events until `pred` matches, discarding the rest.
async fn expect<F>(
    rx: &mut mpsc::Receiver<Arc<ServerEvent>>,
    what: &str,
    pred: F,
) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
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

/// Receive events until `pred` matches, returning everything seen along
/// the way plus the match.
async fn drain_until<F>(
    rx: &mut mpsc::Receiver<Arc<ServerEvent>>,
    what: &str,
    pred: F,
) -> (Vec<ServerEvent>, ServerEvent)
where
    F: Fn(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut seen = Vec::new();
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            panic!("timeout waiting for {what}");
        }
        match tokio::time::timeout(deadline - now, rx.recv()).await {
            Ok(Some(ev)) => {
                if pred(&ev) {
                    return (seen, (*ev).clone());
                }
                seen.push((*ev).clone());
            }
            Ok(None) => panic!("channel closed waiting for {what}"),
            Err(_) => panic!("timeout waiting for {what}"),
        }
    }
}

/// Assert that no event matching `pred` arrives within `window`.
async fn assert_silent<F>(rx: &mut mpsc::Receiver<Arc<ServerEvent>>, window: Duration, pred: F)
where
    F: Fn(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return;
        }
        match tokio::time::timeout(deadline - now, rx.recv()).await {
            Ok(Some(ev)) => {
                assert!(!pred(&ev), "unexpected event: {ev:?}");
            }
            Ok(None) | Err(_) => return,
        }
    }
}

async fn send(tx: &mpsc::Sender<RoomMsg>, socket_id: SocketId, event: ClientEvent) {
    tx.send(RoomMsg::Client { socket_id, event })
        .await
        .expect("room inbox open");
}

fn payload_at(row: i32, col: i32) -> ClientEvent {
    ClientEvent::UpdatePosition {
        x: (f64::from(col) + 0.5) * CELL,
        y: (f64::from(row) + 0.5) * CELL,
        row,
        col,
    }
}

fn answer_key() -> HashMap<String, usize> {
    local_pool()
        .into_iter()
        .map(|q| (q.id, q.correct_index))
        .collect()
}

/// Create a room with `n` members; the first client is the host.
async fn create_room_with_players(
    state: &Arc<AppState>,
    n: usize,
) -> (mpsc::Sender<RoomMsg>, String, Vec<Client>) {
    let (host_socket, mut host_rx) = connect(state);
    let (code, tx) = state
        .store
        .create_room(8, None, state.runtime_deps())
        .expect("room creation");
    tx.send(RoomMsg::Join {
        socket_id: host_socket,
        player_name: Some("Alice".into()),
    })
    .await
    .unwrap();

    let created = expect(&mut host_rx, "room_created", |e| {
        matches!(e, ServerEvent::RoomCreated { .. })
    })
    .await;
    let ServerEvent::RoomCreated {
        room_code,
        player_id,
        ..
    } = created
    else {
        unreachable!()
    };
    assert_eq!(room_code, code);

    let mut clients = vec![Client {
        socket_id: host_socket,
        player_id,
        rx: host_rx,
    }];

    for i in 1..n {
        let (socket_id, mut rx) = connect(state);
        tx.send(RoomMsg::Join {
            socket_id,
            player_name: Some(format!("Player{i}")),
        })
        .await
        .unwrap();
        let joined = expect(&mut rx, "room_joined", |e| {
            matches!(e, ServerEvent::RoomJoined { .. })
        })
        .await;
        let ServerEvent::RoomJoined { player_id, .. } = joined else {
            unreachable!()
        };
        clients.push(Client {
            socket_id,
            player_id,
            rx,
        });
    }

    (tx, code, clients)
}

/// Answer a client's entry quiz with all-correct answers.
async fn answer_entry_quiz(tx: &mpsc::Sender<RoomMsg>, client: &mut Client) {
    let ev = expect(&mut client.rx, "blitz_start", |e| {
        matches!(e, ServerEvent::BlitzStart { .. })
    })
    .await;
    answer_quiz_from(tx, client, &ev).await;
}

async fn answer_quiz_from(tx: &mpsc::Sender<RoomMsg>, client: &mut Client, blitz: &ServerEvent) {
    let ServerEvent::BlitzStart { questions, .. } = blitz else {
        panic!("not a blitz_start event: {blitz:?}");
    };
    let key = answer_key();
    for (question_index, q) in questions.iter().enumerate() {
        let answer_index = key
            .get(&q.id)
            .copied()
            .expect("entry quiz question comes from the local pool");
        send(
            tx,
            client.socket_id,
            ClientEvent::BlitzAnswer {
                question_index,
                answer_index,
            },
        )
        .await;
        expect(&mut client.rx, "blitz_answer_result", |e| {
            matches!(e, ServerEvent::BlitzAnswerResult { .. })
        })
        .await;
    }
}

struct HuntSetup {
    tx: mpsc::Sender<RoomMsg>,
    clients: Vec<Client>,
    unicorn_ids: Vec<PlayerId>,
    spawns: HashMap<PlayerId, PositionPayload>,
    coins: Vec<CoinView>,
    sinkholes: Vec<SinkholeView>,
}

/// Create a room, start the game, play everyone through the entry quiz,
/// and wait for the hunt to begin.
async fn setup_hunt(state: &Arc<AppState>, n: usize) -> HuntSetup {
    let (tx, _code, mut clients) = create_room_with_players(state, n).await;

    let host_socket = clients[0].socket_id;
    send(&tx, host_socket, ClientEvent::StartGame {}).await;

    // The host's stream carries the full start sequence: spawns, coins,
    // sinkholes, traps, then the unicast blitz_start.
    let (start_events, host_blitz) = drain_until(&mut clients[0].rx, "host blitz_start", |e| {
        matches!(e, ServerEvent::BlitzStart { .. })
    })
    .await;

    let mut spawns = HashMap::new();
    let mut coins = Vec::new();
    let mut sinkholes = Vec::new();
    for ev in &start_events {
        match ev {
            ServerEvent::PlayerRespawn {
                player_id,
                position,
            } => {
                spawns.insert(*player_id, *position);
            }
            ServerEvent::CoinSpawned { coin } => coins.push(coin.clone()),
            ServerEvent::SinkholeSpawned { sinkhole } => sinkholes.push(sinkhole.clone()),
            _ => {}
        }
    }
    assert_eq!(spawns.len(), n, "every player gets a spawn cell");
    assert!(!coins.is_empty());

    answer_quiz_from(&tx, &mut clients[0], &host_blitz).await;
    for client in clients.iter_mut().skip(1) {
        answer_entry_quiz(&tx, client).await;
    }

    // Round end window, then the hunt.
    let hunt = expect(&mut clients[0].rx, "hunt_start", |e| {
        matches!(e, ServerEvent::HuntStart { .. })
    })
    .await;
    let ServerEvent::HuntStart { unicorn_ids, .. } = hunt else {
        unreachable!()
    };
    for client in clients.iter_mut().skip(1) {
        expect(&mut client.rx, "hunt_start", |e| {
            matches!(e, ServerEvent::HuntStart { .. })
        })
        .await;
    }

    HuntSetup {
        tx,
        clients,
        unicorn_ids,
        spawns,
        coins,
        sinkholes,
    }
}

// =============================================================================
// Scenario 1: create + join + start
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn create_join_start_flow() {
    let state = AppState::new(test_config());
    let (tx, code, mut clients) = create_room_with_players(&state, 2).await;

    // Room code has the generated shape.
    assert_eq!(code.len(), 7);
    assert!(code.starts_with("MAZ"));
    assert!(code[3..].chars().all(|c| c.is_ascii_uppercase()));

    // Both see a room_update with two players.
    for client in &mut clients {
        let update = expect(&mut client.rx, "room_update", |e| {
            matches!(e, ServerEvent::RoomUpdate { room } if room.players.len() == 2)
        })
        .await;
        let ServerEvent::RoomUpdate { room } = update else {
            unreachable!()
        };
        assert_eq!(room.players.len(), 2);
    }

    // Host starts: everyone sees game_started, the phase change, and a
    // blitz_start with the configured question count.
    send(&tx, clients[0].socket_id, ClientEvent::StartGame {}).await;
    for client in &mut clients {
        expect(&mut client.rx, "game_started", |e| {
            matches!(e, ServerEvent::GameStarted {})
        })
        .await;
        expect(&mut client.rx, "phase_change", |e| {
            matches!(
                e,
                ServerEvent::PhaseChange {
                    phase: RoomPhase::BlitzQuiz
                }
            )
        })
        .await;
        let blitz = expect(&mut client.rx, "blitz_start", |e| {
            matches!(e, ServerEvent::BlitzStart { .. })
        })
        .await;
        let ServerEvent::BlitzStart { questions, .. } = blitz else {
            unreachable!()
        };
        assert_eq!(questions.len(), 3);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn non_host_cannot_start() {
    let state = AppState::new(test_config());
    let (tx, _code, mut clients) = create_room_with_players(&state, 2).await;

    send(&tx, clients[1].socket_id, ClientEvent::StartGame {}).await;
    expect(&mut clients[1].rx, "start_error", |e| {
        matches!(e, ServerEvent::StartError { .. })
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn join_unknown_room_code_is_rejected() {
    let state = AppState::new(test_config());
    let (_tx, code, _clients) = create_room_with_players(&state, 1).await;
    assert_ne!(code, "MAZZZZZ");
    assert!(state.store.get("MAZZZZZ").is_none());
}

// =============================================================================
// Scenario 2: coin single-flight
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn coin_collection_is_single_flight() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 2).await;
    let coin_id = setup.coins[0].coin_id.clone();

    // Both players report the same pickup back to back.
    for client in &setup.clients {
        send(
            &setup.tx,
            client.socket_id,
            ClientEvent::CollectCoin {
                coin_id: coin_id.clone(),
            },
        )
        .await;
    }

    // Exactly one coin_collected lands, crediting exactly one player.
    let collected = expect(&mut setup.clients[0].rx, "coin_collected", |e| {
        matches!(e, ServerEvent::CoinCollected { .. })
    })
    .await;
    let ServerEvent::CoinCollected {
        coin_id: got_id,
        player_coins,
        ..
    } = collected
    else {
        unreachable!()
    };
    assert_eq!(got_id, coin_id);
    // Every player answered their whole entry quiz correctly, so the coin
    // lands on top of the blitz winner bonus.
    assert_eq!(
        player_coins,
        state.config.game.blitz_winner_bonus + state.config.game.coin_value
    );

    assert_silent(
        &mut setup.clients[0].rx,
        Duration::from_millis(60),
        |e| matches!(e, ServerEvent::CoinCollected { coin_id: c, .. } if *c == coin_id),
    )
    .await;

    // The coin respawns at a fresh cell and becomes collectible again.
    let respawned = expect(&mut setup.clients[0].rx, "coin_spawned", |e| {
        matches!(e, ServerEvent::CoinSpawned { coin } if coin.coin_id == coin_id)
    })
    .await;
    let ServerEvent::CoinSpawned { coin } = respawned else {
        unreachable!()
    };
    send(
        &setup.tx,
        setup.clients[1].socket_id,
        ClientEvent::CollectCoin {
            coin_id: coin.coin_id.clone(),
        },
    )
    .await;
    expect(&mut setup.clients[1].rx, "second coin_collected", |e| {
        matches!(e, ServerEvent::CoinCollected { coin_id: c, .. } if *c == coin.coin_id)
    })
    .await;
}

// =============================================================================
// Scenario 3: tag with i-frames and freeze
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn tag_applies_iframes_then_freeze() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 2).await;

    let hunter_idx = setup
        .clients
        .iter()
        .position(|c| setup.unicorn_ids.contains(&c.player_id))
        .expect("one hunter among two players");
    let survivor_idx = 1 - hunter_idx;
    let survivor_id = setup.clients[survivor_idx].player_id;
    let hunter_socket = setup.clients[hunter_idx].socket_id;
    let survivor_spawn = setup.spawns[&survivor_id];

    // Past the post-spawn grace window.
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Tag 1: the hunter reports a move ending on the survivor's cell.
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    let tagged = expect(&mut setup.clients[survivor_idx].rx, "player_tagged", |e| {
        matches!(e, ServerEvent::PlayerTagged { .. })
    })
    .await;
    let ServerEvent::PlayerTagged {
        victim_id, damage, ..
    } = tagged
    else {
        unreachable!()
    };
    assert_eq!(victim_id, survivor_id);
    assert_eq!(damage, 50);
    expect(&mut setup.clients[survivor_idx].rx, "health 50", |e| {
        matches!(e, ServerEvent::HealthUpdate { player_id, health } if *player_id == survivor_id && *health == 50)
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "iframes", |e| {
        matches!(e, ServerEvent::PlayerStateChange { player_id, state } if *player_id == survivor_id && *state == PlayerState::InIFrames)
    })
    .await;

    // Tag attempt during the i-frame window: no event.
    tokio::time::sleep(Duration::from_millis(30)).await;
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    assert_silent(
        &mut setup.clients[survivor_idx].rx,
        Duration::from_millis(100),
        |e| matches!(e, ServerEvent::PlayerTagged { .. }),
    )
    .await;

    // After the window (and the pair cooldown) the next tag freezes.
    expect(&mut setup.clients[survivor_idx].rx, "iframes expire", |e| {
        matches!(e, ServerEvent::PlayerStateChange { player_id, state } if *player_id == survivor_id && *state == PlayerState::Active)
    })
    .await;
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "second tag", |e| {
        matches!(e, ServerEvent::PlayerTagged { victim_id, .. } if *victim_id == survivor_id)
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "frozen", |e| {
        matches!(e, ServerEvent::PlayerStateChange { player_id, state } if *player_id == survivor_id && *state == PlayerState::Frozen)
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "unfreeze quiz", |e| {
        matches!(e, ServerEvent::UnfreezeQuizStart { .. })
    })
    .await;

    // Frozen players take no further tags, whatever the hunter does.
    tokio::time::sleep(Duration::from_millis(150)).await;
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    assert_silent(
        &mut setup.clients[survivor_idx].rx,
        Duration::from_millis(100),
        |e| matches!(e, ServerEvent::PlayerTagged { .. }),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unfreeze_quiz_thaws_and_respawns() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 2).await;

    let hunter_idx = setup
        .clients
        .iter()
        .position(|c| setup.unicorn_ids.contains(&c.player_id))
        .unwrap();
    let survivor_idx = 1 - hunter_idx;
    let survivor_id = setup.clients[survivor_idx].player_id;
    let survivor_socket = setup.clients[survivor_idx].socket_id;
    let hunter_socket = setup.clients[hunter_idx].socket_id;
    let survivor_spawn = setup.spawns[&survivor_id];

    // Freeze the survivor with two tags.
    tokio::time::sleep(Duration::from_millis(60)).await;
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "iframes expire", |e| {
        matches!(e, ServerEvent::PlayerStateChange { player_id, state } if *player_id == survivor_id && *state == PlayerState::Active)
    })
    .await;
    send(
        &setup.tx,
        hunter_socket,
        payload_at(survivor_spawn.row, survivor_spawn.col),
    )
    .await;
    let quiz = expect(&mut setup.clients[survivor_idx].rx, "unfreeze quiz", |e| {
        matches!(e, ServerEvent::UnfreezeQuizStart { .. })
    })
    .await;
    let ServerEvent::UnfreezeQuizStart { question } = quiz else {
        unreachable!()
    };

    // A wrong answer deals a new question.
    let key = answer_key();
    let correct = key[&question.id];
    let wrong = (correct + 1) % question.options.len();
    send(
        &setup.tx,
        survivor_socket,
        ClientEvent::SubmitUnfreezeQuizAnswer {
            question_index: 0,
            answer_index: wrong,
        },
    )
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "wrong result", |e| {
        matches!(e, ServerEvent::UnfreezeQuizResult { correct: false, .. })
    })
    .await;
    let retry = expect(&mut setup.clients[survivor_idx].rx, "new question", |e| {
        matches!(e, ServerEvent::UnfreezeQuizStart { .. })
    })
    .await;
    let ServerEvent::UnfreezeQuizStart { question } = retry else {
        unreachable!()
    };

    // The correct answer thaws, restores health, and respawns.
    send(
        &setup.tx,
        survivor_socket,
        ClientEvent::SubmitUnfreezeQuizAnswer {
            question_index: 0,
            answer_index: key[&question.id],
        },
    )
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "correct result", |e| {
        matches!(e, ServerEvent::UnfreezeQuizResult { correct: true, .. })
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "thawed", |e| {
        matches!(e, ServerEvent::PlayerStateChange { player_id, state } if *player_id == survivor_id && *state == PlayerState::Active)
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "full health", |e| {
        matches!(e, ServerEvent::HealthUpdate { player_id, health } if *player_id == survivor_id && *health == 100)
    })
    .await;
    expect(&mut setup.clients[survivor_idx].rx, "respawn", |e| {
        matches!(e, ServerEvent::PlayerRespawn { player_id, .. } if *player_id == survivor_id)
    })
    .await;
}

// =============================================================================
// Scenario 4: grace-period reconnect
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_within_grace_restores_state() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 3).await;

    // Bob is a non-host member.
    let bob_idx = 1;
    let bob_id = setup.clients[bob_idx].player_id;
    let bob_socket = setup.clients[bob_idx].socket_id;
    let bob_spawn = setup.spawns[&bob_id];

    // Bob picks up a coin first so reconnect has state to restore.
    let coin_id = setup.coins[0].coin_id.clone();
    send(
        &setup.tx,
        bob_socket,
        ClientEvent::CollectCoin { coin_id },
    )
    .await;
    expect(&mut setup.clients[0].rx, "bob's coin", |e| {
        matches!(e, ServerEvent::CoinCollected { player_id, .. } if *player_id == bob_id)
    })
    .await;

    // Bob's connection drops.
    state.hub.unregister_socket(&bob_socket);
    setup
        .tx
        .send(RoomMsg::Disconnected {
            socket_id: bob_socket,
        })
        .await
        .unwrap();
    expect(&mut setup.clients[0].rx, "player_disconnected", |e| {
        matches!(e, ServerEvent::PlayerDisconnected { player_id } if *player_id == bob_id)
    })
    .await;

    // Bob reconnects on a fresh socket inside the grace window.
    let (new_socket, mut new_rx) = connect(&state);
    assert_ne!(new_socket, bob_socket);
    setup
        .tx
        .send(RoomMsg::Rejoin {
            socket_id: new_socket,
            player_id: bob_id,
        })
        .await
        .unwrap();

    let rejoined = expect(&mut new_rx, "rejoined", |e| {
        matches!(e, ServerEvent::Rejoined(_))
    })
    .await;
    let ServerEvent::Rejoined(payload) = rejoined else {
        unreachable!()
    };
    assert_eq!(payload.player_id, bob_id);
    let bob_view = payload
        .room
        .players
        .iter()
        .find(|p| p.player_id == bob_id)
        .unwrap();
    assert_eq!(
        bob_view.coins,
        state.config.game.blitz_winner_bonus + state.config.game.coin_value
    );
    assert_eq!(bob_view.health, 100);
    assert!(bob_view.connected);
    assert_eq!(payload.position.row, bob_spawn.row);
    assert_eq!(payload.position.col, bob_spawn.col);

    // The others are told.
    expect(&mut setup.clients[0].rx, "player_reconnected", |e| {
        matches!(e, ServerEvent::PlayerReconnected { player_id } if *player_id == bob_id)
    })
    .await;

    // The grace timer must be dead: no player_left after its deadline.
    assert_silent(
        &mut setup.clients[0].rx,
        Duration::from_millis(700),
        |e| matches!(e, ServerEvent::PlayerLeft { player_id } if *player_id == bob_id),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn grace_expiry_removes_the_player() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 3).await;

    let bob_idx = 1;
    let bob_id = setup.clients[bob_idx].player_id;
    let bob_socket = setup.clients[bob_idx].socket_id;

    state.hub.unregister_socket(&bob_socket);
    setup
        .tx
        .send(RoomMsg::Disconnected {
            socket_id: bob_socket,
        })
        .await
        .unwrap();
    expect(&mut setup.clients[0].rx, "player_disconnected", |e| {
        matches!(e, ServerEvent::PlayerDisconnected { player_id } if *player_id == bob_id)
    })
    .await;

    // Grace is 500 ms in this config; expiry runs the permanent-remove
    // path.
    expect(&mut setup.clients[0].rx, "player_left", |e| {
        matches!(e, ServerEvent::PlayerLeft { player_id } if *player_id == bob_id)
    })
    .await;

    // Rejoining after expiry fails.
    let (new_socket, mut new_rx) = connect(&state);
    setup
        .tx
        .send(RoomMsg::Rejoin {
            socket_id: new_socket,
            player_id: bob_id,
        })
        .await
        .unwrap();
    expect(&mut new_rx, "rejoin_error", |e| {
        matches!(e, ServerEvent::RejoinError { .. })
    })
    .await;
}

// =============================================================================
// Scenario 5: hunter succession
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn last_hunter_leaving_restarts_the_blitz() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 3).await;

    // ceil(3 * 0.3) = 1 hunter.
    assert_eq!(setup.unicorn_ids.len(), 1);
    let hunter_id = setup.unicorn_ids[0];
    let hunter_idx = setup
        .clients
        .iter()
        .position(|c| c.player_id == hunter_id)
        .unwrap();
    let hunter_socket = setup.clients[hunter_idx].socket_id;
    let observer_idx = (hunter_idx + 1) % 3;

    send(&setup.tx, hunter_socket, ClientEvent::LeaveRoom {}).await;

    expect(&mut setup.clients[observer_idx].rx, "player_left", |e| {
        matches!(e, ServerEvent::PlayerLeft { player_id } if *player_id == hunter_id)
    })
    .await;
    let transfer = expect(
        &mut setup.clients[observer_idx].rx,
        "unicorn_transferred",
        |e| matches!(e, ServerEvent::UnicornTransferred { .. }),
    )
    .await;
    let ServerEvent::UnicornTransferred { unicorn_ids } = transfer else {
        unreachable!()
    };
    assert!(unicorn_ids.is_empty());

    let hunt_end = expect(&mut setup.clients[observer_idx].rx, "hunt_end", |e| {
        matches!(e, ServerEvent::HuntEnd { .. })
    })
    .await;
    let ServerEvent::HuntEnd { reason } = hunt_end else {
        unreachable!()
    };
    assert_eq!(reason, "unicorn_disconnected");

    expect(&mut setup.clients[observer_idx].rx, "fresh blitz", |e| {
        matches!(e, ServerEvent::BlitzStart { .. })
    })
    .await;
}

// =============================================================================
// Scenario 6: teleport bypasses path collision
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn teleport_skips_the_line_between_portals() {
    let mut cfg = test_config();
    // A tag on the way to the portal must not freeze anyone.
    cfg.game.tag_damage = 10;
    let state = AppState::new(cfg);
    let mut setup = setup_hunt(&state, 2).await;

    assert_eq!(setup.sinkholes.len(), 2, "initial pair of portals");
    let hole_a = setup.sinkholes[0].clone();
    let hole_b = setup.sinkholes[1].clone();

    let hunter_idx = setup
        .clients
        .iter()
        .position(|c| setup.unicorn_ids.contains(&c.player_id))
        .unwrap();
    let survivor_idx = 1 - hunter_idx;
    let survivor_id = setup.clients[survivor_idx].player_id;
    let survivor_socket = setup.clients[survivor_idx].socket_id;
    let hunter_socket = setup.clients[hunter_idx].socket_id;

    // Park the hunter on the midpoint of the line between the portals.
    let mid_row = (hole_a.row + hole_b.row) / 2;
    let mid_col = (hole_a.col + hole_b.col) / 2;
    tokio::time::sleep(Duration::from_millis(60)).await;
    send(&setup.tx, hunter_socket, payload_at(mid_row, mid_col)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The survivor walks onto portal A and enters it.
    send(
        &setup.tx,
        survivor_socket,
        payload_at(hole_a.row, hole_a.col),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(
        &setup.tx,
        survivor_socket,
        ClientEvent::EnterSinkhole {
            sinkhole_id: hole_a.sinkhole_id.clone(),
        },
    )
    .await;

    let teleported = expect(&mut setup.clients[hunter_idx].rx, "player_teleported", |e| {
        matches!(e, ServerEvent::PlayerTeleported { player_id, .. } if *player_id == survivor_id)
    })
    .await;
    let ServerEvent::PlayerTeleported { from, to, .. } = teleported else {
        unreachable!()
    };
    assert_eq!((from.row, from.col), (hole_a.row, hole_a.col));
    assert_eq!((to.row, to.col), (hole_b.row, hole_b.col));

    // Wait out any i-frames from an incidental tag on the way in, then
    // report the post-teleport position. The move is flagged teleport, so
    // the line crossing the hunter's cell is never path-checked.
    tokio::time::sleep(Duration::from_millis(350)).await;
    let mut survivor_rx_drain = Vec::new();
    while let Ok(ev) = setup.clients[survivor_idx].rx.try_recv() {
        survivor_rx_drain.push(ev);
    }
    send(
        &setup.tx,
        survivor_socket,
        payload_at(hole_b.row, hole_b.col),
    )
    .await;
    assert_silent(
        &mut setup.clients[survivor_idx].rx,
        Duration::from_millis(150),
        |e| matches!(e, ServerEvent::PlayerTagged { victim_id, .. } if *victim_id == survivor_id),
    )
    .await;
}

// =============================================================================
// Leaderboard and game end
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn host_end_game_broadcasts_leaderboard_and_destroys_room() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 2).await;

    send(&setup.tx, setup.clients[0].socket_id, ClientEvent::EndGame {}).await;
    let end = expect(&mut setup.clients[1].rx, "game_end", |e| {
        matches!(e, ServerEvent::GameEnd { .. })
    })
    .await;
    let ServerEvent::GameEnd {
        leaderboard,
        reason,
    } = end
    else {
        unreachable!()
    };
    assert_eq!(reason, "host_ended");
    assert_eq!(leaderboard.len(), 2);

    // The store forgets the room shortly after.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.store.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn position_updates_are_throttled_per_socket() {
    let state = AppState::new(test_config());
    let mut setup = setup_hunt(&state, 2).await;

    let mover_idx = 0;
    let observer_idx = 1;
    let mover_socket = setup.clients[mover_idx].socket_id;
    let mover_id = setup.clients[mover_idx].player_id;

    tokio::time::sleep(Duration::from_millis(60)).await;

    // A burst of reports inside one throttle interval collapses to one
    // accepted update.
    for col in 0..5 {
        send(&setup.tx, mover_socket, payload_at(0, col)).await;
    }
    expect(&mut setup.clients[observer_idx].rx, "one update", |e| {
        matches!(e, ServerEvent::PlayerPositionUpdate { player_id, .. } if *player_id == mover_id)
    })
    .await;
    assert_silent(
        &mut setup.clients[observer_idx].rx,
        Duration::from_millis(30),
        |e| matches!(e, ServerEvent::PlayerPositionUpdate { player_id, .. } if *player_id == mover_id),
    )
    .await;
}
