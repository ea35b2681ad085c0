//! The acquisition cycle and the state machine that runs it.
//!
//! While `Scanning`, a worker thread owns the link exclusively and runs
//! cycles back to back until stopped or until a cycle fails. Either way the
//! orchestrator ends up `Idle` again, with the link handed back unless the
//! failure left it unusable.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gastrack_format::Command;
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::consts;
use crate::error::{Error, Result};
use crate::link::CommandChannel;
use crate::lock;
use crate::report::{FrameProcessor, FrameReport};

/// Notifications for the presentation side
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    ConnectionFailed(String),
    Frame(FrameReport),
    ScanAborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Scanning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTimings {
    /// After `heating_off`, before the first scan
    pub settle: Duration,
    /// Between the two scans
    pub between_scans: Duration,
    /// After a frame, before the next cycle
    pub rest: Duration,
}

impl Default for CycleTimings {
    fn default() -> Self {
        Self {
            settle: consts::SETTLE,
            between_scans: consts::BETWEEN_SCANS,
            rest: consts::REST,
        }
    }
}

/// One cycle up to the frame: heater off, settle, scan, scan again and
/// take the difference. Every wait gives way to `cancel`.
pub fn run_cycle<C: CommandChannel>(
    link: &mut C,
    processor: &FrameProcessor,
    timings: &CycleTimings,
    cancel: &CancelToken,
) -> Result<FrameReport> {
    cancel.check()?;
    link.send(Command::HeatingOff)?;
    cancel.sleep(timings.settle)?;

    let before = link.fetch_snapshot(Command::Data1)?;
    debug!("first snapshot in");
    cancel.sleep(timings.between_scans)?;

    let after = link.fetch_snapshot(Command::Data2)?;
    debug!("second snapshot in");

    Ok(processor.process(&after, &before))
}

struct Shared<C> {
    state: State,
    link: Option<C>,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancelToken,
}

pub struct Orchestrator<C> {
    shared: Arc<Mutex<Shared<C>>>,
    worker: Mutex<Option<Worker>>,
    processor: FrameProcessor,
    timings: CycleTimings,
    events: Mutex<Sender<Event>>,
}

impl<C: CommandChannel + 'static> Orchestrator<C> {
    pub fn new(processor: FrameProcessor, timings: CycleTimings, events: Sender<Event>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: State::Idle,
                link: None,
            })),
            worker: Mutex::new(None),
            processor,
            timings,
            events: Mutex::new(events),
        }
    }

    /// Hands a freshly connected link over, replacing any idle one.
    pub fn attach(&self, link: C) {
        lock(&self.shared).link = Some(link);
    }

    pub fn state(&self) -> State {
        lock(&self.shared).state
    }

    pub fn is_connected(&self) -> bool {
        let shared = lock(&self.shared);
        shared.state == State::Scanning || shared.link.is_some()
    }

    /// Starts scanning. A no-op while already scanning.
    pub fn start(&self) -> Result<()> {
        let mut worker = lock(&self.worker);
        let link = {
            let mut shared = lock(&self.shared);
            if shared.state == State::Scanning {
                debug!("already scanning");
                return Ok(());
            }
            let link = shared.link.take().ok_or(Error::NotConnected)?;
            shared.state = State::Scanning;
            link
        };

        // A previous worker that stopped on its own has already finished
        if let Some(done) = worker.take() {
            done.handle.join().ok();
        }

        let cancel = CancelToken::new();
        let handle = {
            let shared = Arc::clone(&self.shared);
            let events = lock(&self.events).clone();
            let processor = self.processor;
            let timings = self.timings;
            let cancel = cancel.clone();
            thread::spawn(move || {
                let mut link = link;
                let reason = scan_until_stopped(&mut link, &processor, &timings, &cancel, &events);
                let keep_link = match &reason {
                    Error::Cancelled => {
                        info!("scanning stopped");
                        true
                    }
                    e => {
                        error!(error = %e, "scanning aborted");
                        !e.is_link_fatal()
                    }
                };
                {
                    let mut shared = lock(&shared);
                    shared.state = State::Idle;
                    if keep_link {
                        shared.link = Some(link);
                    }
                }
                // Only once Idle, so a listener sees the link as it is left
                if !matches!(reason, Error::Cancelled) {
                    events.send(Event::ScanAborted(reason.to_string())).ok();
                }
            })
        };
        info!("scanning started");
        *worker = Some(Worker { handle, cancel });
        Ok(())
    }

    /// Stops scanning and waits for the worker, which at most finishes the
    /// request it has in flight. A no-op while idle.
    pub fn stop(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if worker.handle.join().is_err() {
                error!("acquisition thread panicked");
                lock(&self.shared).state = State::Idle;
            }
        }
    }
}

impl<C> Drop for Orchestrator<C> {
    fn drop(&mut self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            worker.handle.join().ok();
        }
    }
}

fn scan_until_stopped<C: CommandChannel>(
    link: &mut C,
    processor: &FrameProcessor,
    timings: &CycleTimings,
    cancel: &CancelToken,
    events: &Sender<Event>,
) -> Error {
    loop {
        let report = match run_cycle(link, processor, timings, cancel) {
            Ok(report) => report,
            Err(e) => return e,
        };
        match report.bearing.estimate() {
            Some(estimate) => info!(
                x = estimate.x,
                y = estimate.y,
                angle = estimate.angle_deg(),
                "frame"
            ),
            None => info!("frame, no bearing"),
        }
        events.send(Event::Frame(report)).ok();

        if let Err(e) = cancel.sleep(timings.rest) {
            return e;
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Instant;

    use gastrack_calc::Bearing;
    use gastrack_format::{MalformedResponse, RawSnapshot};

    use super::*;

    const INSTANT: CycleTimings = CycleTimings {
        settle: Duration::ZERO,
        between_scans: Duration::ZERO,
        rest: Duration::ZERO,
    };

    type Reply = Result<RawSnapshot>;

    /// Records what it is sent and plays back scripted replies; once the
    /// script runs out it answers `data1` with 100s and `data2` with 150s.
    #[derive(Clone, Default)]
    struct FakeChannel {
        sent: Arc<Mutex<Vec<Command>>>,
        replies: Arc<Mutex<VecDeque<Reply>>>,
    }

    impl FakeChannel {
        fn scripted(replies: Vec<Reply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl CommandChannel for FakeChannel {
        fn send(&mut self, command: Command) -> Result<()> {
            self.sent.lock().unwrap().push(command);
            Ok(())
        }

        fn fetch_snapshot(&mut self, command: Command) -> Result<RawSnapshot> {
            self.sent.lock().unwrap().push(command);
            match self.replies.lock().unwrap().pop_front() {
                Some(reply) => reply,
                None if command == Command::Data1 => Ok(RawSnapshot([100; 45])),
                None => Ok(RawSnapshot([150; 45])),
            }
        }
    }

    fn orchestrator(timings: CycleTimings) -> (Orchestrator<FakeChannel>, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Orchestrator::new(FrameProcessor::default(), timings, tx), rx)
    }

    fn next_event(rx: &Receiver<Event>) -> Event {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn cycle_order_and_difference() {
        let mut link = FakeChannel::default();
        let report =
            run_cycle(&mut link, &FrameProcessor::default(), &INSTANT, &CancelToken::new()).unwrap();

        assert_eq!(link.sent(), [Command::HeatingOff, Command::Data1, Command::Data2]);
        assert!(report.frame.iter().all(|&d| d == 50));
    }

    #[test]
    fn frame_is_second_minus_first() {
        let mut before = RawSnapshot([300; 45]);
        before[4] = 310;
        let after = RawSnapshot([200; 45]);
        let mut link = FakeChannel::scripted(vec![Ok(before), Ok(after)]);
        let report =
            run_cycle(&mut link, &FrameProcessor::default(), &INSTANT, &CancelToken::new()).unwrap();

        assert_eq!(report.frame[0], -100);
        assert_eq!(report.frame[4], -110);
    }

    #[test]
    fn malformed_response_fails_the_cycle() {
        let bad = Err(Error::MalformedResponse(MalformedResponse::WrongCount {
            expected: 45,
            found: 4,
        }));
        let mut link = FakeChannel::scripted(vec![Ok(RawSnapshot([1; 45])), bad]);
        let result = run_cycle(&mut link, &FrameProcessor::default(), &INSTANT, &CancelToken::new());
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn cancelled_cycle_sends_nothing() {
        let mut link = FakeChannel::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = run_cycle(&mut link, &FrameProcessor::default(), &INSTANT, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(link.sent().is_empty());
    }

    #[test]
    fn start_needs_a_link() {
        let (orchestrator, _rx) = orchestrator(INSTANT);
        assert!(matches!(orchestrator.start(), Err(Error::NotConnected)));
        assert_eq!(orchestrator.state(), State::Idle);
    }

    #[test]
    fn scans_until_stopped() {
        let (orchestrator, rx) = orchestrator(INSTANT);
        orchestrator.attach(FakeChannel::default());
        orchestrator.start().unwrap();
        assert_eq!(orchestrator.state(), State::Scanning);

        for _ in 0..3 {
            match next_event(&rx) {
                Event::Frame(report) => assert_ne!(report.bearing, Bearing::Undefined),
                other => panic!("unexpected {:?}", other),
            }
        }

        orchestrator.stop();
        assert_eq!(orchestrator.state(), State::Idle);
        assert!(orchestrator.is_connected());
    }

    #[test]
    fn start_while_scanning_is_a_no_op() {
        let link = FakeChannel::default();
        let (orchestrator, rx) = orchestrator(CycleTimings {
            rest: Duration::from_secs(60),
            ..INSTANT
        });
        orchestrator.attach(link.clone());
        orchestrator.start().unwrap();
        next_event(&rx);

        orchestrator.start().unwrap();
        assert_eq!(orchestrator.state(), State::Scanning);
        assert_eq!(link.sent().len(), 3);
        orchestrator.stop();
    }

    #[test]
    fn stop_interrupts_a_long_wait() {
        let (orchestrator, _rx) = orchestrator(CycleTimings {
            settle: Duration::from_secs(60),
            ..INSTANT
        });
        orchestrator.attach(FakeChannel::default());
        orchestrator.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        orchestrator.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(orchestrator.state(), State::Idle);
    }

    #[test]
    fn failed_cycle_returns_to_idle() {
        let failing = FakeChannel::scripted(vec![Err(Error::ScanFailed { row: 3, column: 1 })]);
        let (orchestrator, rx) = orchestrator(INSTANT);
        orchestrator.attach(failing);
        orchestrator.start().unwrap();

        match next_event(&rx) {
            Event::ScanAborted(msg) => assert!(msg.contains("row 3")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(orchestrator.state(), State::Idle);
        // The link is still in step, so scanning can resume
        assert!(orchestrator.is_connected());
        orchestrator.start().unwrap();
        assert!(matches!(next_event(&rx), Event::Frame(_)));
        orchestrator.stop();
    }

    #[test]
    fn abort_event_follows_the_state_change() {
        for _ in 0..200 {
            let (orchestrator, rx) = orchestrator(INSTANT);
            orchestrator.attach(FakeChannel::scripted(vec![Err(Error::LinkClosed)]));
            orchestrator.start().unwrap();

            assert!(matches!(next_event(&rx), Event::ScanAborted(_)));
            assert_eq!(orchestrator.state(), State::Idle);
            assert!(!orchestrator.is_connected());
        }
    }

    #[test]
    fn dead_link_is_dropped() {
        let (orchestrator, rx) = orchestrator(INSTANT);
        orchestrator.attach(FakeChannel::scripted(vec![Err(Error::LinkClosed)]));
        orchestrator.start().unwrap();

        assert!(matches!(next_event(&rx), Event::ScanAborted(_)));
        orchestrator.stop();
        assert!(!orchestrator.is_connected());
        assert!(matches!(orchestrator.start(), Err(Error::NotConnected)));
    }
}
