use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hardware_race::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::rounds::{Script, ScriptedCatalog};

mod rounds;

/// Stand-in for a vehicle: a local socket collecting datagrams.
struct FakeVehicle {
    socket: UdpSocket,
}

impl FakeVehicle {
    fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        Self { socket }
    }

    fn recv(&self) -> Option<String> {
        let mut buf = [0; 64];
        let (n, _) = self.socket.recv_from(&mut buf).ok()?;
        Some(String::from_utf8_lossy(&buf[..n]).into_owned())
    }
}

fn fast_config(a: &FakeVehicle, b: &FakeVehicle) -> Configuration {
    Configuration::new()
        .with_destination(Team::A, a.socket.local_addr().unwrap())
        .with_destination(Team::B, b.socket.local_addr().unwrap())
        .with_ready_poll_interval(Duration::from_millis(2))
        .with_settle_delay(Duration::from_millis(5))
        .with_countdown(3, Duration::from_millis(5))
        .with_score_display(Duration::from_millis(5))
        .with_relaunch_delay(Duration::from_millis(5))
        .with_verbose(false)
}

fn always_ready(_team: Team) -> bool {
    true
}

#[test]
fn calibration_waits_for_both_teams() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let ready = Arc::new(ReadyFlags::new());
    let mut session =
        Session::new(fast_config(&a, &b), ScriptedCatalog::default(), ready.clone()).unwrap();
    assert_eq!(session.phase(), Phase::Calibrating);

    ready.signal(Team::A);
    let late = ready.clone();
    let start = Instant::now();
    let signaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        late.signal(Team::B);
    });

    assert!(session.calibrate(&AtomicBool::new(true)));
    assert!(start.elapsed() >= Duration::from_millis(50));
    signaller.join().unwrap();
}

#[test]
fn calibration_stops_on_shutdown() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let never = |_team: Team| false;
    let mut session = Session::new(fast_config(&a, &b), ScriptedCatalog::default(), never).unwrap();
    assert!(!session.calibrate(&AtomicBool::new(false)));
}

#[test]
fn countdown_reaches_zero() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let mut session =
        Session::new(fast_config(&a, &b), ScriptedCatalog::default(), always_ready).unwrap();
    assert!(session.countdown(&AtomicBool::new(true)));
    assert_eq!(session.phase(), Phase::Countdown(0));
}

#[test]
fn win_is_scored_and_sent_to_the_winner() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[("tanks", Script::Text("Player 1 Wins!"))]);
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    let report = session.play_round(&AtomicBool::new(true));
    assert_eq!(
        report,
        RoundReport::Played {
            round: "tanks".to_owned(),
            outcome: RoundOutcome::Winner(Team::A),
        }
    );
    assert_eq!(session.phase(), Phase::ScoreDisplay);
    assert_eq!(session.ledger().score(Team::A), 1);
    assert_eq!(session.ledger().score(Team::B), 0);
    assert_eq!(session.current_round(), None);
    assert_eq!(a.recv().as_deref(), Some("WIN"));
    assert_eq!(b.recv(), None);
}

#[test]
fn color_result_from_another_thread() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[(
        "plinko",
        Script::Later(RoundOutcome::from_result_text("Pink Wins")),
    )]);
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    session.play_round(&AtomicBool::new(true));
    assert_eq!(session.ledger().score(Team::B), 1);
    assert_eq!(b.recv().as_deref(), Some("WIN"));
    assert_eq!(a.recv(), None);
}

#[test]
fn tie_changes_nothing() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[("pong", Script::Text("It's a Tie!"))]);
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    let report = session.play_round(&AtomicBool::new(true));
    assert!(matches!(
        report,
        RoundReport::Played {
            outcome: RoundOutcome::Tie,
            ..
        }
    ));
    assert_eq!(session.ledger().score(Team::A), 0);
    assert_eq!(session.ledger().score(Team::B), 0);
    assert_eq!(a.recv(), None);
    assert_eq!(b.recv(), None);
}

#[test]
fn failed_launch_is_skipped() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[
        ("broken", Script::FailStart),
        ("masher", Script::Text("Team B")),
    ]);
    let played = catalog.played.clone();
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready)
        .unwrap()
        .with_selector(RoundSelector::with_rng(StdRng::seed_from_u64(11)));

    let running = AtomicBool::new(true);
    let reports: Vec<RoundReport> = (0..4).map(|_| session.play_round(&running)).collect();

    let failures = reports
        .iter()
        .filter(|r| matches!(r, RoundReport::LaunchFailed { round } if round == "broken"))
        .count();
    assert_eq!(failures, 2);
    assert_eq!(session.ledger().score(Team::B), 2);
    // the deck keeps alternating even though one round never starts
    let played = played.lock().unwrap().clone();
    assert!(played.windows(2).all(|w| w[0] != w[1]), "{played:?}");
}

#[test]
fn abandoned_round_scores_nothing() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[("tron", Script::Drop)]);
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    assert_eq!(
        session.play_round(&AtomicBool::new(true)),
        RoundReport::Abandoned {
            round: "tron".to_owned()
        }
    );
    assert_eq!(session.ledger().score(Team::A), 0);
    assert_eq!(session.current_round(), None);
}

#[test]
fn abandoned_rounds_are_paced() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[("tron", Script::Drop)]);
    let config = fast_config(&a, &b).with_relaunch_delay(Duration::from_millis(50));
    let mut session = Session::new(config, catalog, always_ready).unwrap();

    let running = AtomicBool::new(true);
    let start = Instant::now();
    let mut dealt = 0;
    while start.elapsed() < Duration::from_millis(200) {
        assert!(matches!(
            session.play_round(&running),
            RoundReport::Abandoned { .. }
        ));
        dealt += 1;
    }
    assert!(dealt <= 5, "{dealt} rounds dealt in 200ms");
}

#[test]
fn empty_catalog() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let mut session =
        Session::new(fast_config(&a, &b), ScriptedCatalog::default(), always_ready).unwrap();
    assert_eq!(
        session.play_round(&AtomicBool::new(true)),
        RoundReport::NoRounds
    );
}

#[test]
fn shutdown_interrupts_a_running_round() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[("fencing", Script::Hang)]);
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let stopper = {
        let running = running.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            running.store(false, Ordering::Relaxed);
        })
    };
    assert_eq!(session.play_round(&running), RoundReport::Interrupted);
    assert_eq!(session.current_round(), Some("fencing"));
    stopper.join().unwrap();
}

#[test]
fn full_session_runs_rounds_until_shutdown() {
    let (a, b) = (FakeVehicle::new(), FakeVehicle::new());
    let catalog = ScriptedCatalog::new(&[
        ("pong", Script::Later(RoundOutcome::Winner(Team::A))),
        ("tron", Script::Text("Blue Wins!")),
        ("plinko", Script::Text("Tie")),
        ("galaga", Script::Later(RoundOutcome::Winner(Team::A))),
    ]);
    let played = catalog.played.clone();
    let mut session = Session::new(fast_config(&a, &b), catalog, always_ready).unwrap();

    // stop once Team A's vehicle got three wins
    let running = Arc::new(AtomicBool::new(true));
    let watcher = {
        let running = running.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            let mut wins = 0;
            while wins < 3 && Instant::now() < deadline {
                if a.recv().as_deref() == Some("WIN") {
                    wins += 1;
                }
            }
            running.store(false, Ordering::Relaxed);
            wins
        })
    };

    session.run(&running);
    assert_eq!(watcher.join().unwrap(), 3);

    assert!(session.ledger().score(Team::A) >= 3);
    assert_eq!(session.ledger().score(Team::B), 0);
    assert_eq!(b.recv(), None);
    let played = played.lock().unwrap().clone();
    assert!(played.windows(2).all(|w| w[0] != w[1]), "{played:?}");
}
