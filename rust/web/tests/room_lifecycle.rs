/// Room lifecycle through the registry: admission, turns, decided rounds,
/// resets, departures and concurrent arrivals.
use std::sync::Arc;
use std::time::Duration;
use tictac_engine::mark::{Mark, Winner};
use tictac_web::protocol::ServerMessage;
use tictac_web::registry::{Admission, JoinError, RegistryError, RoomRegistry};
use tictac_web::room::{RoomError, RoomSnapshot};
use tictac_web::server::{AppContext, ServerConfig};
use tokio::sync::Barrier;
use tokio::task::JoinSet;

fn context_with_room(code: &str) -> AppContext {
    let ctx = AppContext::new(ServerConfig::for_tests());
    ctx.directory().create_room(code, "alice").expect("create room");
    ctx
}

fn drain(admission: &mut Admission) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = admission.subscription.receiver.try_recv() {
        messages.push(message);
    }
    messages
}

fn last_state(admission: &mut Admission) -> Option<RoomSnapshot> {
    drain(admission).into_iter().rev().find_map(|message| match message {
        ServerMessage::State { state } => Some(state),
        ServerMessage::Init { .. } => None,
    })
}

/// Returns `(to_move, waiting)` for the current turn.
fn by_turn<'a>(
    registry: &RoomRegistry,
    code: &str,
    a: &'a Admission,
    b: &'a Admission,
) -> (&'a Admission, &'a Admission) {
    let snapshot = registry.snapshot(code).expect("live room");
    let turn = snapshot.turn.expect("round started");
    if snapshot.players[&turn] == a.username {
        (a, b)
    } else {
        (b, a)
    }
}

#[tokio::test]
async fn second_arrival_starts_round_with_both_roles_dealt() {
    let ctx = context_with_room("ABC1");
    let registry = ctx.registry();

    let mut alice = registry.join("ABC1", "alice").expect("alice joins");
    let first = last_state(&mut alice).expect("state after first join");
    assert!(!first.started);
    assert_eq!(first.turn, None);
    assert!(first.players.is_empty());

    let mut bob = registry.join("ABC1", "bob").expect("bob joins");
    let messages = drain(&mut bob);
    assert!(matches!(&messages[0], ServerMessage::Init { username } if username == "bob"));

    let state = last_state(&mut alice).expect("alice sees start");
    assert!(state.started);
    assert!(state.turn.is_some());
    assert_eq!(state.players.len(), 2);
    let mut names: Vec<&str> = state.players.values().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(state.board.empty_cells(), 9);
}

#[tokio::test]
async fn top_row_win_scores_and_deletes_record() {
    let ctx = context_with_room("ABC1");
    let registry = ctx.registry();
    let mut alice = registry.join("ABC1", "alice").expect("alice");
    let mut bob = registry.join("ABC1", "bob").expect("bob");

    let (first, second) = by_turn(&registry, "ABC1", &alice, &bob);
    let (first_id, second_id) = (first.connection_id, second.connection_id);
    let first_name = first.username.clone();

    for (who, cell) in [(first_id, 2), (second_id, 4), (first_id, 0), (second_id, 6)] {
        registry.make_move("ABC1", who, cell).expect("legal move");
    }
    let result = registry.make_move("ABC1", first_id, 1).expect("winning move");

    let state = last_state(&mut alice).expect("final state");
    assert_eq!(last_state(&mut bob), Some(state.clone()));

    let winning_mark = result.mark;
    assert_eq!(state.winner, Some(Winner::from(winning_mark)));
    assert_eq!(state.players[&winning_mark], first_name);
    for cell in [0, 1, 2] {
        assert_eq!(state.board.cell(cell), Some(winning_mark));
    }
    for cell in [4, 6] {
        assert_eq!(state.board.cell(cell), Some(winning_mark.opponent()));
    }
    assert_eq!(state.scores.wins(winning_mark), 1);
    assert_eq!(state.scores.wins(winning_mark.opponent()), 0);
    assert!(state.finished_at.is_some());
    assert!(state.winning_cells.is_empty());

    assert!(ctx.directory().find_room("ABC1").expect("find").is_none());
    assert!(matches!(
        registry.join("ABC1", "carol"),
        Err(JoinError::RoomNotFound(_))
    ));

    // no further moves after a decided round
    assert!(matches!(
        registry.make_move("ABC1", second_id, 8),
        Err(RegistryError::Rejected(RoomError::AlreadyFinished))
    ));
}

#[tokio::test]
async fn full_board_without_line_is_a_draw() {
    let ctx = context_with_room("DRAW");
    let registry = ctx.registry();
    let mut alice = registry.join("DRAW", "alice").expect("alice");
    let bob = registry.join("DRAW", "bob").expect("bob");

    let (first, second) = by_turn(&registry, "DRAW", &alice, &bob);
    let (first_id, second_id) = (first.connection_id, second.connection_id);

    let sequence = [0, 2, 1, 3, 5, 4, 6, 7, 8];
    for (turn, cell) in sequence.into_iter().enumerate() {
        let who = if turn % 2 == 0 { first_id } else { second_id };
        registry.make_move("DRAW", who, cell).expect("legal move");
    }

    let state = last_state(&mut alice).expect("final state");
    assert_eq!(state.winner, Some(Winner::Draw));
    assert_eq!(state.scores.wins(Mark::X), 0);
    assert_eq!(state.scores.wins(Mark::O), 0);
    assert_eq!(state.board.empty_cells(), 0);
}

#[tokio::test]
async fn rejected_actions_change_nothing_and_stay_silent() {
    let ctx = context_with_room("ABC1");
    let registry = ctx.registry();
    let mut alice = registry.join("ABC1", "alice").expect("alice");
    let mut bob = registry.join("ABC1", "bob").expect("bob");
    drain(&mut alice);
    drain(&mut bob);

    let (first, second) = by_turn(&registry, "ABC1", &alice, &bob);
    let (first_id, second_id) = (first.connection_id, second.connection_id);
    let before = registry.snapshot("ABC1").expect("live");

    assert!(registry.make_move("ABC1", second_id, 0).is_err());
    assert!(registry.make_move("ABC1", first_id, 9).is_err());
    assert!(registry.make_move("ABC1", first_id, -1).is_err());
    assert!(matches!(
        registry.reset("ABC1", first_id),
        Err(RegistryError::Rejected(RoomError::NotFinished))
    ));

    registry.make_move("ABC1", first_id, 4).expect("legal");
    assert!(matches!(
        registry.make_move("ABC1", second_id, 4),
        Err(RegistryError::Rejected(RoomError::IllegalMove(_)))
    ));

    let after = registry.snapshot("ABC1").expect("live");
    assert_eq!(after.board.empty_cells(), before.board.empty_cells() - 1);
    assert_eq!(after.turn, before.turn.map(Mark::opponent));
    assert_eq!(drain(&mut alice).len(), 1);
    assert_eq!(drain(&mut bob).len(), 1);
}

#[tokio::test]
async fn reset_keeps_scores_and_deals_again() {
    let ctx = context_with_room("ABC1");
    let registry = ctx.registry();
    let mut alice = registry.join("ABC1", "alice").expect("alice");
    let bob = registry.join("ABC1", "bob").expect("bob");

    let (first, second) = by_turn(&registry, "ABC1", &alice, &bob);
    let (first_id, second_id) = (first.connection_id, second.connection_id);
    for (who, cell) in [
        (first_id, 2),
        (second_id, 4),
        (first_id, 0),
        (second_id, 6),
        (first_id, 1),
    ] {
        registry.make_move("ABC1", who, cell).expect("legal");
    }
    let decided = registry.snapshot("ABC1").expect("live");
    let winner = decided.winner.and_then(Winner::mark).expect("line winner");

    registry.reset("ABC1", second_id).expect("reset after win");
    let state = last_state(&mut alice).expect("state after reset");
    assert!(state.started);
    assert!(state.turn.is_some());
    assert_eq!(state.winner, None);
    assert_eq!(state.finished_at, None);
    assert_eq!(state.board.empty_cells(), 9);
    assert_eq!(state.scores.wins(winner), 1);
    assert_eq!(state.players.len(), 2);
}

#[tokio::test]
async fn departure_stops_round_without_broadcast() {
    let ctx = context_with_room("ABC1");
    let registry = ctx.registry();
    let mut alice = registry.join("ABC1", "alice").expect("alice");
    let bob = registry.join("ABC1", "bob").expect("bob");
    drain(&mut alice);

    let bob_id = bob.connection_id;
    drop(bob);
    registry.leave("ABC1", bob_id).expect("leave");

    assert!(drain(&mut alice).is_empty());
    let state = registry.snapshot("ABC1").expect("room kept for alice");
    assert!(!state.started);
    assert_eq!(state.turn, None);
    assert!(state.players.is_empty());
    assert!(ctx.directory().find_room("ABC1").expect("find").is_some());

    // a newcomer restarts the round
    let mut carol = registry.join("ABC1", "carol").expect("carol");
    let state = last_state(&mut carol).expect("state");
    assert!(state.started);
    assert_eq!(state.players.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_arrivals_admit_exactly_two() {
    const ARRIVALS: usize = 12;
    let ctx = Arc::new(context_with_room("RACE"));
    let start = Arc::new(Barrier::new(ARRIVALS));

    let mut join_set = JoinSet::new();
    for i in 0..ARRIVALS {
        let ctx = Arc::clone(&ctx);
        let start = Arc::clone(&start);
        join_set.spawn(async move {
            // release every arrival at once so joins contend across workers
            start.wait().await;
            ctx.registry().join("RACE", &format!("player{i}"))
        });
    }

    let mut admitted = Vec::new();
    let mut refused = 0;
    while let Some(result) = join_set.join_next().await {
        match result.expect("task completed") {
            Ok(admission) => admitted.push(admission),
            Err(JoinError::RoomFull(code)) => {
                assert_eq!(code, "RACE");
                refused += 1;
            }
            Err(other) => panic!("unexpected join error: {other}"),
        }
    }

    assert_eq!(admitted.len(), 2);
    assert_eq!(refused, ARRIVALS - 2);
    assert_eq!(ctx.event_bus().group_size("RACE"), 2);
    let state = ctx.registry().snapshot("RACE").expect("live");
    assert!(state.started);
}

#[tokio::test]
async fn rooms_are_independent() {
    let ctx = context_with_room("ONE");
    ctx.directory().create_room("TWO", "dave").expect("create");
    let registry = ctx.registry();

    let mut one = registry.join("ONE", "alice").expect("join one");
    let _two_a = registry.join("TWO", "dave").expect("join two");
    drain(&mut one);

    let _two_b = registry.join("TWO", "erin").expect("join two");
    assert!(drain(&mut one).is_empty());
    assert_eq!(registry.room_count(), 2);
    assert!(registry.snapshot("TWO").expect("two").started);
    assert!(!registry.snapshot("ONE").expect("one").started);
}

#[tokio::test]
async fn last_departure_removes_room_and_record() {
    let ctx = context_with_room("GONE");
    let registry = ctx.registry();
    let alice = registry.join("GONE", "alice").expect("alice");

    registry.leave("GONE", alice.connection_id).expect("leave");
    assert_eq!(registry.room_count(), 0);
    assert!(registry.snapshot("GONE").is_none());
    assert!(ctx.directory().find_room("GONE").expect("find").is_none());
}

#[tokio::test]
async fn decided_room_expires_after_ttl() {
    let ctx = AppContext::new(ServerConfig::for_tests().with_room_ttl(Duration::from_millis(20)));
    ctx.directory().create_room("TTL", "alice").expect("create");
    let registry = ctx.registry();
    let alice = registry.join("TTL", "alice").expect("alice");
    let bob = registry.join("TTL", "bob").expect("bob");

    let (first, second) = by_turn(&registry, "TTL", &alice, &bob);
    let (first_id, second_id) = (first.connection_id, second.connection_id);
    for (who, cell) in [
        (first_id, 2),
        (second_id, 4),
        (first_id, 0),
        (second_id, 6),
        (first_id, 1),
    ] {
        registry.make_move("TTL", who, cell).expect("legal");
    }
    assert!(registry.snapshot("TTL").is_some());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(registry.sweep_expired(), 1);
    assert!(registry.snapshot("TTL").is_none());
    assert_eq!(ctx.event_bus().group_size("TTL"), 0);
}
