//! Serves a simulated rig over TCP, so the host can run without hardware.

use std::error::Error;
use std::net::{SocketAddr, TcpListener};

use clap::{App, Arg};
use gastrack_firmware::consts::LISTEN_PORT;
use gastrack_firmware::session;
use gastrack_firmware::sim::SimBoard;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gastrack_firmware=info")),
        )
        .init();

    let default_bind = format!("127.0.0.1:{}", LISTEN_PORT);
    let matches = App::new("Gastrack rig simulator")
        .version("0.1")
        .arg(
            Arg::with_name("BIND")
                .index(1)
                .takes_value(true)
                .default_value(&default_bind)
                .help("Address to listen on"),
        )
        .arg(
            Arg::with_name("BUSY_POLLS")
                .long("busy-polls")
                .takes_value(true)
                .help("Busy bytes the converter sends before each sample"),
        )
        .arg(
            Arg::with_name("JAM")
                .long("jam")
                .takes_value(true)
                .help("Cell that never finishes converting, as ROW,COLUMN"),
        )
        .get_matches();

    let bind: SocketAddr = matches.value_of("BIND").unwrap_or(&default_bind).parse()?;

    let board = SimBoard::new();
    if let Some(polls) = matches.value_of("BUSY_POLLS") {
        board.set_busy_polls(polls.parse()?);
    }
    if let Some(cell) = matches.value_of("JAM") {
        let (row, column) = cell.split_once(',').ok_or("--jam takes ROW,COLUMN")?;
        board.jam_cell(row.trim().parse()?, column.trim().parse()?);
    }

    let mut rig = board.rig()?;
    let listener = TcpListener::bind(bind)?;
    tracing::info!(address = %bind, "simulated rig listening");
    session::serve(&listener, &mut rig)?;
    Ok(())
}
