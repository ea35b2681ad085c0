use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use gastrack::link::{self, ConnectOptions};
use gastrack::{CancelToken, CommandChannel, Error, Event};
use gastrack_format::Command;

fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn options(address: SocketAddr) -> ConnectOptions {
    ConnectOptions {
        timeout: Duration::from_millis(500),
        backoff: Duration::from_millis(10),
        response_timeout: Duration::from_millis(200),
        ..ConnectOptions::new(address)
    }
}

#[test]
fn gives_up_after_max_attempts() {
    let (tx, rx) = mpsc::channel();
    let options = ConnectOptions {
        max_attempts: Some(3),
        ..options(closed_port())
    };

    let result = link::connect(&options, &CancelToken::new(), &tx);
    assert!(matches!(result, Err(Error::RetriesExhausted { attempts: 3 })));

    let failures = rx
        .try_iter()
        .filter(|e| matches!(e, Event::ConnectionFailed(_)))
        .count();
    assert_eq!(failures, 3);
}

#[test]
fn cancel_ends_unbounded_retries() {
    let (tx, _rx) = mpsc::channel();
    let options = ConnectOptions {
        backoff: Duration::from_secs(60),
        ..options(closed_port())
    };
    let cancel = CancelToken::new();
    let connecting = {
        let cancel = cancel.clone();
        thread::spawn(move || link::connect(&options, &cancel, &tx).map(|_| ()))
    };

    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    cancel.cancel();
    let result = connecting.join().unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn connects_and_reports_it() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (tx, rx) = mpsc::channel();
    let link = link::connect(&options(listener.local_addr().unwrap()), &CancelToken::new(), &tx).unwrap();
    assert_eq!(link.peer_addr().unwrap(), listener.local_addr().unwrap());
    assert_eq!(rx.try_recv().unwrap(), Event::Connected);
}

#[test]
fn silent_rig_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (tx, _rx) = mpsc::channel();
    let mut link = link::connect(&options(listener.local_addr().unwrap()), &CancelToken::new(), &tx).unwrap();
    let (_held, _) = listener.accept().unwrap();

    let start = Instant::now();
    let result = link.fetch_snapshot(Command::Data2);
    assert!(matches!(result, Err(Error::ResponseTimeout(_))));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn hang_up_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let rig = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // Take the whole request, then hang up without answering
        let mut buf = [0u8; 64];
        loop {
            let len = stream.read(&mut buf).unwrap();
            if len == 0 || buf[..len].contains(&0) {
                break;
            }
        }
    });
    let (tx, _rx) = mpsc::channel();
    let mut link = link::connect(&options(address), &CancelToken::new(), &tx).unwrap();

    let result = link.fetch_snapshot(Command::Data1);
    assert!(matches!(result, Err(Error::LinkClosed)), "{:?}", result.err());
    rig.join().unwrap();
}

#[test]
fn heating_off_has_nothing_to_wait_for() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (tx, _rx) = mpsc::channel();
    let mut link = link::connect(&options(listener.local_addr().unwrap()), &CancelToken::new(), &tx).unwrap();
    assert!(matches!(
        link.fetch_snapshot(Command::HeatingOff),
        Err(Error::UnexpectedResponse { command: "heating_off" })
    ));
}
