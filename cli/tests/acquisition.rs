//! Host against the simulated rig, over loopback TCP.

use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gastrack::orchestrator::{run_cycle, CycleTimings};
use gastrack::{
    link, CancelToken, CommandChannel, ConnectOptions, Error, Event, FrameProcessor, Link,
    Orchestrator, State,
};
use gastrack_format::Command;
use gastrack_firmware::session;
use gastrack_firmware::sim::SimBoard;

const INSTANT: CycleTimings = CycleTimings {
    settle: Duration::ZERO,
    between_scans: Duration::ZERO,
    rest: Duration::ZERO,
};

fn spawn_rig(board: &SimBoard) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let mut rig = board.rig().unwrap();
    thread::spawn(move || session::serve(&listener, &mut rig));
    address
}

fn connect(address: SocketAddr) -> Link {
    let (tx, _rx) = mpsc::channel();
    let options = ConnectOptions {
        max_attempts: Some(3),
        backoff: Duration::from_millis(10),
        response_timeout: Duration::from_secs(5),
        ..ConnectOptions::new(address)
    };
    link::connect(&options, &CancelToken::new(), &tx).unwrap()
}

#[test]
fn one_cycle_end_to_end() {
    let board = SimBoard::new();
    let mut link = connect(spawn_rig(&board));

    let report = run_cycle(&mut link, &FrameProcessor::default(), &INSTANT, &CancelToken::new()).unwrap();

    // Cold scan first, heated scan second: each module rises by 50 per module number
    for (index, &d) in report.frame.iter().enumerate() {
        assert_eq!(d, 50 * (index as i32 / 9 + 1), "cell {}", index);
    }
    assert_eq!(*report.concentrations, [50.0, 100.0, 150.0, 200.0, 250.0]);

    let estimate = report.bearing.estimate().unwrap();
    assert!((estimate.x - 100.0 / 350.0).abs() < 1e-12);
    assert!(estimate.y.abs() < 1e-12);
    assert!(estimate.angle_deg().abs() < 1e-9);
    assert!(board.heating());
}

#[test]
fn scan_failure_keeps_the_link_usable() {
    let board = SimBoard::new();
    board.jam_cell(10, 2);
    let mut link = connect(spawn_rig(&board));
    let processor = FrameProcessor::default();

    let result = run_cycle(&mut link, &processor, &INSTANT, &CancelToken::new());
    assert!(matches!(result, Err(Error::ScanFailed { row: 10, column: 2 })));
    assert!(board.heating(), "data1 reheats even when its scan fails");

    board.clear_jam();
    assert!(run_cycle(&mut link, &processor, &INSTANT, &CancelToken::new()).is_ok());
}

#[test]
fn orchestrated_scanning() {
    let board = SimBoard::new();
    let address = spawn_rig(&board);

    let (tx, rx) = mpsc::channel();
    let rig = Arc::new(Orchestrator::new(FrameProcessor::default(), INSTANT, tx.clone()));
    let options = ConnectOptions {
        max_attempts: Some(3),
        ..ConnectOptions::new(address)
    };
    gastrack::connect_in_background(options, Arc::clone(&rig), tx, CancelToken::new())
        .join()
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Event::Connected);
    assert!(rig.is_connected());

    rig.start().unwrap();
    for _ in 0..2 {
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Event::Frame(report) => assert_eq!(report.frame[44], 250),
            other => panic!("unexpected {:?}", other),
        }
    }
    rig.stop();
    assert_eq!(rig.state(), State::Idle);
    assert!(rig.is_connected());
}

#[test]
fn heater_faults_keep_the_link_in_step() {
    let board = SimBoard::new();
    let mut link = connect(spawn_rig(&board));
    board.stick_heater(true);

    // The fault from heating_off arrives ahead of the data2 snapshot
    link.send(Command::HeatingOff).unwrap();
    assert!(matches!(
        link.fetch_snapshot(Command::Data2),
        Err(Error::HeaterFault { on: false })
    ));
    assert!(link.fetch_snapshot(Command::Data2).is_ok());

    let processor = FrameProcessor::default();
    let result = run_cycle(&mut link, &processor, &INSTANT, &CancelToken::new());
    assert!(matches!(result, Err(Error::HeaterFault { on: true })));

    board.stick_heater(false);
    assert!(run_cycle(&mut link, &processor, &INSTANT, &CancelToken::new()).is_ok());
}
