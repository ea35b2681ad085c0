use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use once_cell::sync::Lazy;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::{lock, CancelToken, Config, Error, Event, Link, Orchestrator};

/// Differential cells, concentrations and the `(x, y)` estimate, if any
type PyFrame = (Vec<i32>, Vec<f64>, Option<(f64, f64)>);

static RIG: Lazy<Mutex<Option<Arc<Orchestrator<Link>>>>> = Lazy::new(|| Mutex::new(None));
static FRAMES: Lazy<Mutex<Vec<PyFrame>>> = Lazy::new(|| Mutex::new(Vec::new()));

impl From<Error> for PyErr {
    fn from(e: Error) -> Self {
        PyRuntimeError::new_err(e.to_string())
    }
}

fn rig() -> PyResult<Arc<Orchestrator<Link>>> {
    lock(&RIG)
        .as_ref()
        .map(Arc::clone)
        .ok_or_else(|| Error::NotConnected.into())
}

/// Starts connecting to the rig at `address`; frames are collected in the
/// background once scanning is started.
#[pyfunction]
fn init(address: String) -> PyResult<()> {
    let address: SocketAddr = address
        .parse()
        .map_err(|e: std::net::AddrParseError| PyValueError::new_err(e.to_string()))?;
    let config = Config {
        address,
        ..Config::default()
    };

    let (tx, rx) = mpsc::channel::<Event>();
    let orchestrator = Arc::new(Orchestrator::new(config.processor()?, config.timings()?, tx.clone()));
    crate::connect_in_background(
        config.connect_options()?,
        Arc::clone(&orchestrator),
        tx,
        CancelToken::new(),
    );

    thread::spawn(move || {
        for event in rx.into_iter() {
            if let Event::Frame(report) = event {
                let estimate = report.bearing.estimate().map(|e| (e.x, e.y));
                lock(&FRAMES).push((
                    report.frame.to_vec(),
                    report.concentrations.to_vec(),
                    estimate,
                ));
            }
        }
    });

    *lock(&RIG) = Some(orchestrator);
    Ok(())
}

#[pyfunction]
fn start() -> PyResult<()> {
    Ok(rig()?.start()?)
}

#[pyfunction]
fn stop() -> PyResult<()> {
    rig()?.stop();
    Ok(())
}

#[pyfunction]
fn is_connected() -> PyResult<bool> {
    Ok(rig()?.is_connected())
}

#[pyfunction]
fn get_frames() -> PyResult<Vec<PyFrame>> {
    Ok(std::mem::take(&mut *lock(&FRAMES)))
}

#[pymodule]
fn gastrack(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init, m)?)?;
    m.add_function(wrap_pyfunction!(start, m)?)?;
    m.add_function(wrap_pyfunction!(stop, m)?)?;
    m.add_function(wrap_pyfunction!(is_connected, m)?)?;
    m.add_function(wrap_pyfunction!(get_frames, m)?)?;
    Ok(())
}
