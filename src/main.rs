//! atshell - interactive shell for serial AT command devices
//!
//! Reads one line at a time from stdin and hands it to the shell. Lines given
//! with `-c` run first; if there are any the shell exits afterwards.

use anyhow::Context;
use atshell_core::cli::logging::{self, LogControl};
use atshell_core::{
    AppConfig, CliResult, CommandDictionary, Flow, History, Interrupt, LineInput, PipeMode,
    PortConfig, SerialConnector, Shell, StdinLineReader, StdoutSink,
};
use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// How often the idle prompt checks for Ctrl-C
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Serial AT command shell
#[derive(Parser, Debug)]
#[command(name = "atshell", version, about = "Interactive shell for serial AT command devices", long_about = None)]
struct Cli {
    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Serial device to open at start-up
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<String>,

    /// Data bits (5, 6, 7, 8)
    #[arg(long)]
    bytesize: Option<String>,

    /// Parity (N, E, O, M, S)
    #[arg(long)]
    parity: Option<String>,

    /// Stop bits (1, 2)
    #[arg(long)]
    stopbits: Option<String>,

    /// XON/XOFF flow control (True or False)
    #[arg(long = "sw-flow-ctrl")]
    sw_flow_ctrl: Option<String>,

    /// RTS/CTS flow control (True or False)
    #[arg(long = "hw-rts-cts")]
    hw_rts_cts: Option<String>,

    /// DSR/DTR flow control (True or False)
    #[arg(long = "hw-dsr-dtr")]
    hw_dsr_dtr: Option<String>,

    /// Read timeout in seconds, or None
    #[arg(long)]
    timeout: Option<String>,

    /// Command dictionary file
    #[arg(long, env = "ATSHELL_DICTIONARY")]
    dictionary: Option<PathBuf>,

    /// History file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run this line, then exit (repeatable)
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,
}

impl Cli {
    /// `serial_open` arguments for the connection flags, if any was given
    fn initial_open(&self) -> Option<String> {
        let flags = [
            &self.port,
            &self.baud,
            &self.bytesize,
            &self.parity,
            &self.stopbits,
            &self.sw_flow_ctrl,
            &self.hw_rts_cts,
            &self.hw_dsr_dtr,
            &self.timeout,
        ];
        if flags.iter().all(|f| f.is_none()) {
            return None;
        }

        let args: Vec<String> = PortConfig::default()
            .positional_args()
            .into_iter()
            .zip(flags)
            .map(|(default, flag)| flag.clone().unwrap_or(default))
            .collect();
        Some(args.join(" "))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log = match logging::init(cli.debug) {
        Ok(log) => Some(log),
        Err(e) => {
            eprintln!("atshell: logging unavailable: {e}");
            None
        }
    };

    match run(&cli, log) {
        Ok(()) => CliResult::success().to_exit_code(),
        Err(e) => {
            let result = CliResult::from(e);
            if let Some(msg) = result.message() {
                tracing::error!("{}", msg);
            }
            result.to_exit_code()
        }
    }
}

fn run(cli: &Cli, log: Option<LogControl>) -> anyhow::Result<()> {
    tracing::debug!("Starting atshell v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("loading settings")?;

    let dictionary = match cli.dictionary.clone().or_else(|| config.dictionary_path()) {
        Some(path) => load_dictionary(&path)?,
        None => CommandDictionary::new(),
    };

    let mut history = match cli.history.clone().or_else(|| config.history_path()) {
        Some(path) => History::with_path(path),
        None => History::in_memory(),
    };
    history.set_max_length(config.history_length);
    if let Err(e) = history.load() {
        tracing::warn!("Could not read history: {}", e);
    }

    let interrupt = Interrupt::new();
    let handler_side = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_side.trigger()) {
        tracing::warn!("Ctrl-C handler not installed: {}", e);
    }

    let mut shell = Shell::new(
        Box::new(SerialConnector),
        dictionary,
        Box::new(StdoutSink::new()),
    )
    .with_history(history)
    .with_interrupt(interrupt.clone())
    .with_highlights(config.highlight_rules());
    if let Some(log) = log {
        shell = shell.with_debug_switch(Box::new(move |on| log.set_debug(on)));
    }

    if let Some(args) = cli.initial_open() {
        if let Err(e) = shell.open(&args) {
            tracing::error!("{}", e);
        }
    }

    if !cli.commands.is_empty() {
        for line in &cli.commands {
            if shell.handle_line(line) == Flow::Exit {
                return Ok(());
            }
        }
        shell.shutdown();
        return Ok(());
    }

    interactive(&mut shell, &interrupt);
    Ok(())
}

fn load_dictionary(path: &Path) -> anyhow::Result<CommandDictionary> {
    match CommandDictionary::load(path) {
        Ok(dictionary) => {
            if dictionary.is_empty() {
                tracing::warn!("No commands in dictionary file {}", path.display());
            } else {
                tracing::info!("Dictionary loaded");
            }
            Ok(dictionary)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No dictionary at {}", path.display());
            Ok(CommandDictionary::new())
        }
        Err(e) => Err(e).with_context(|| format!("accessing {}", path.display())),
    }
}

fn interactive(shell: &mut Shell, interrupt: &Interrupt) {
    let mode = PipeMode::detect();
    let reader = StdinLineReader::new();
    // A Ctrl-C pressed before the prompt shows up is stale
    interrupt.take();

    loop {
        if mode.is_interactive() {
            print!("{}", shell.prompt());
            // A closed stdout is not worth aborting the session for
            let _ = io::stdout().flush();
        }

        let line = loop {
            if interrupt.take() {
                tracing::info!("Keyboard interrupt");
                break None;
            }
            match reader.recv_line_timeout(INPUT_POLL) {
                LineInput::Line(line) => break Some(line),
                LineInput::Timeout => continue,
                LineInput::Closed => {
                    if mode.is_interactive() {
                        println!();
                    }
                    break None;
                }
            }
        };

        match line {
            Some(line) => {
                if shell.handle_line(&line) == Flow::Exit {
                    break;
                }
            }
            None => {
                shell.shutdown();
                break;
            }
        }
    }
}
