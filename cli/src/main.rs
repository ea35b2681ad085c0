use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::process;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use clap::{App, Arg, ArgMatches};
use gastrack::cmd::{Action, Cmd};
use gastrack::store::FrameStore;
use gastrack::{CancelToken, Config, ConnectOptions, Event, FrameReport, Link, Orchestrator};
use tracing_subscriber::EnvFilter;

type Rig = Arc<Orchestrator<Link>>;
type CsvStore = FrameStore<BufWriter<File>>;

fn print_report(report: &FrameReport) {
    let concentrations: Vec<String> = report
        .concentrations
        .iter()
        .map(|c| format!("{:.2}", c))
        .collect();
    match report.bearing.estimate() {
        Some(estimate) => println!(
            "frame: concentrations [{}], bearing {:.1} deg, length {:.2}",
            concentrations.join(", "),
            estimate.angle_deg(),
            estimate.magnitude(),
        ),
        None => println!(
            "frame: concentrations [{}], no bearing",
            concentrations.join(", ")
        ),
    }
}

fn handle_events(
    rx: Receiver<Event>,
    tx: Sender<Event>,
    rig: Rig,
    options: ConnectOptions,
    cancel: CancelToken,
    mut store: Option<CsvStore>,
) {
    for event in rx.into_iter() {
        match event {
            Event::Connected => println!("connected to {}", options.address),
            Event::ConnectionFailed(msg) => eprintln!("connection failed: {}", msg),
            Event::Frame(report) => {
                if let Some(store) = store.as_mut() {
                    if let Err(e) = store.store(&report) {
                        eprintln!("could not store frame: {}", e);
                    }
                }
                print_report(&report);
            }
            Event::ScanAborted(msg) => {
                eprintln!("scan aborted: {}", msg);
                if !rig.is_connected() {
                    eprintln!("link lost, reconnecting");
                    gastrack::connect_in_background(
                        options.clone(),
                        Arc::clone(&rig),
                        tx.clone(),
                        cancel.clone(),
                    );
                }
            }
        }
    }
}

fn run(rig: &Rig) {
    use Action::*;
    let stdin = io::stdin();
    let mut cmd = Cmd::new();
    prompt();
    for line in stdin.lock().lines().filter_map(|r| r.ok()) {
        match cmd.parse_line(&line) {
            StartScan => {
                if let Err(e) = rig.start() {
                    eprintln!("cannot start: {}", e);
                }
            }
            StopScan => rig.stop(),
            PrintStatus => println!(
                "{:?}, {}",
                rig.state(),
                if rig.is_connected() {
                    "connected"
                } else {
                    "not connected"
                }
            ),
            Quit => return,
            Nothing => {}
            PrintErr(msg) => eprintln!("{}", msg),
        }
        prompt();
    }
}

fn prompt() {
    print!("--> ");
    io::stdout().flush().ok();
}

fn load_config(matches: &ArgMatches) -> gastrack::Result<Config> {
    let mut config = match matches.value_of("CONFIG") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(address) = matches.value_of("ADDRESS") {
        config.address = address
            .parse()
            .map_err(|e| gastrack::Error::Config(format!("address {:?}: {}", address, e)))?;
    }
    if let Some(attempts) = matches.value_of("MAX_ATTEMPTS") {
        config.connect.max_attempts = Some(
            attempts
                .parse()
                .map_err(|e| gastrack::Error::Config(format!("max attempts {:?}: {}", attempts, e)))?,
        );
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gastrack=info")),
        )
        .init();

    let matches = App::new("Gastrack commander")
        .version("0.1")
        .arg(
            Arg::with_name("OUT_FILE")
                .short("o")
                .long("outfile")
                .required(false)
                .takes_value(true)
                .help("CSV file to append every frame to"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::with_name("MAX_ATTEMPTS")
                .short("n")
                .long("max-attempts")
                .takes_value(true)
                .help("Give up connecting after this many attempts"),
        )
        .arg(
            Arg::with_name("ADDRESS")
                .index(1)
                .takes_value(true)
                .help("Rig address, e.g. 192.168.8.165:54080"),
        )
        .get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    let store = match matches.value_of("OUT_FILE").map(CsvStore::create).transpose() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("cannot open output file: {}", e);
            process::exit(2);
        }
    };

    // Validated above
    let (options, processor, timings) = match (config.connect_options(), config.processor(), config.timings()) {
        (Ok(options), Ok(processor), Ok(timings)) => (options, processor, timings),
        _ => process::exit(2),
    };

    let (tx, rx) = mpsc::channel::<Event>();
    let rig: Rig = Arc::new(Orchestrator::new(processor, timings, tx.clone()));
    let cancel = CancelToken::new();

    println!("connecting to {}", options.address);
    gastrack::connect_in_background(options.clone(), Arc::clone(&rig), tx.clone(), cancel.clone());
    {
        let rig = Arc::clone(&rig);
        let cancel = cancel.clone();
        thread::spawn(move || handle_events(rx, tx, rig, options, cancel, store));
    }

    run(&rig);
    cancel.cancel();
    rig.stop();
}
