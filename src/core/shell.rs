//! Line-oriented command shell
//!
//! The shell receives one input line at a time. The line is routed to a
//! built-in command, to a stub generated from the command dictionary, or sent
//! to the device as is. Whenever the command wrote to the device, a read pass
//! runs before the next line is accepted.

use super::dictionary::CommandDictionary;
use super::highlight::{HighlightError, HighlightRule, Highlights};
use super::history::History;
use super::interrupt::Interrupt;
use super::output::{OutputSink, Painted};
use super::protocol::{nmea_sentence, NMEA_LINE_ENDING};
use super::registry::{CommandOrigin, CommandRegistry, Handler, Invocation};
use super::session::{
    ReadMode, ReadOutcome, ReadSummary, SerialSession, SessionError, DEFAULT_LINE_ENDING,
};
use super::transport::{list_ports, Connector, TransportError};
use std::io;
use thiserror::Error;

/// What the input loop does after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line
    Continue,
    /// Leave the shell
    Exit,
}

/// Errors reported by shell commands
#[derive(Error, Debug)]
pub enum ShellError {
    /// Session or connection failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Port enumeration failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bad highlight rule
    #[error(transparent)]
    Highlight(#[from] HighlightError),

    /// Argument not understood by a command
    #[error("Wrong argument {0:?} ({1})")]
    InvalidArgument(String, &'static str),

    /// `help` for a name nobody knows
    #[error("No help for {0:?}")]
    UnknownCommand(String),

    /// Local I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Switches debug logging on or off
pub type DebugSwitch = Box<dyn Fn(bool)>;

const BUILTINS: &[(&str, &str, Handler<Shell>)] = &[
    (
        "serial_open",
        "Open a serial device: port baud bytesize parity stopbits xonxoff rtscts dsrdtr timeout",
        cmd_serial_open,
    ),
    ("serial_close", "Close the serial connection (if any)", cmd_serial_close),
    ("serial_info", "Print out info about the current serial connection", cmd_serial_info),
    ("serial_read", "Read from the device; 'nostop' keeps reading until Ctrl-C", cmd_serial_read),
    ("serial_ports", "List serial ports present on this machine", cmd_serial_ports),
    ("set_port", "Move the connection to another device", cmd_set_port),
    ("set_baudrate", "Change the baud rate of the connection", cmd_set_baudrate),
    ("set_bytesize", "Change the data bits (5, 6, 7, 8)", cmd_set_bytesize),
    ("set_parity", "Change the parity (N, E, O, M, S)", cmd_set_parity),
    ("set_stopbits", "Change the stop bits (1, 2)", cmd_set_stopbits),
    ("set_timeout", "Change the read timeout in seconds, or None", cmd_set_timeout),
    ("at", "Send AT command to a connected device", cmd_at),
    ("AT", "Send AT command to a connected device", cmd_at),
    ("nmea", "Send an NMEA sentence, adding '$' and the checksum", cmd_nmea),
    ("dictionary", "Show known commands, optionally only those matching a keyword", cmd_dictionary),
    ("help", "List commands, or show help for one", cmd_help),
    ("history", "Show command history", cmd_history),
    ("clear_history", "Clear command history", cmd_clear_history),
    ("set_history_length", "Maximum number of commands kept in history (-1 for no limit)", cmd_set_history_length),
    ("set_debug", "Enable/Disable debug (True or False)", cmd_set_debug),
    ("highlight", "Highlight device output: <regex>=><colour>", cmd_highlight),
    ("show_highlight", "Show highlight rules", cmd_show_highlight),
    ("remove_highlight", "Remove the highlight rule for a pattern", cmd_remove_highlight),
    ("shell", "Run a command in the system shell", cmd_shell),
    ("exit", "Close the connection, save history and exit", cmd_exit),
    ("quit", "Close the connection, save history and exit", cmd_exit),
];

/// Interactive AT command shell
pub struct Shell {
    session: SerialSession,
    registry: CommandRegistry<Shell>,
    dictionary: CommandDictionary,
    history: History,
    highlights: Highlights,
    sink: Box<dyn OutputSink>,
    interrupt: Interrupt,
    debug_switch: Option<DebugSwitch>,
}

impl Shell {
    /// Build a disconnected shell with built-ins and dictionary stubs
    pub fn new(
        connector: Box<dyn Connector>,
        dictionary: CommandDictionary,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        let mut registry = CommandRegistry::new();
        for (name, brief, handler) in BUILTINS {
            registry.register_builtin(name, brief, *handler);
        }
        let stubs = registry.register_dictionary(&dictionary, cmd_dictionary_stub);
        tracing::debug!("{} dictionary command(s) registered", stubs);

        Self {
            session: SerialSession::new(connector),
            registry,
            dictionary,
            history: History::in_memory(),
            highlights: Highlights::new(),
            sink,
            interrupt: Interrupt::new(),
            debug_switch: None,
        }
    }

    /// Use `history` instead of an in-memory one
    #[must_use]
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Share `interrupt` with whoever raises it
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Start with these highlight rules
    #[must_use]
    pub fn with_highlights(mut self, highlights: Highlights) -> Self {
        self.highlights = highlights;
        self
    }

    /// Hook called by `set_debug`
    #[must_use]
    pub fn with_debug_switch(mut self, switch: DebugSwitch) -> Self {
        self.debug_switch = Some(switch);
        self
    }

    /// Handle one input line.
    ///
    /// Errors are logged, never returned. Only `exit` and `quit` end the
    /// shell. An interrupt raised before or during the line is consumed
    /// here, so it never carries over to the next line or the prompt.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        if self.interrupt.take() {
            tracing::debug!("Dropping stale interrupt");
        }
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        self.history.push(line);

        let flow = match self.dispatch(line) {
            Ok(flow) => flow,
            Err(ShellError::Session(SessionError::NotConnected)) => {
                tracing::warn!("No serial connection established yet");
                Flow::Continue
            }
            Err(e) => {
                tracing::error!("{}", e);
                Flow::Continue
            }
        };

        if flow == Flow::Continue && self.session.take_pending_read() {
            if let Err(e) = self.read_pass(ReadMode::Normal) {
                tracing::error!("{}", e);
            }
        }
        if self.interrupt.take() {
            tracing::info!("Keyboard interrupt");
        }
        flow
    }

    /// Close the connection and save the history
    pub fn shutdown(&mut self) {
        self.session.close();
        if let Err(e) = self.history.save() {
            tracing::error!("Could not save history: {}", e);
        }
    }

    /// Prompt for the next line
    pub fn prompt(&self) -> String {
        self.session.prompt()
    }

    /// Open the initial connection from `serial_open` style arguments
    pub fn open(&mut self, args: &str) -> Result<(), ShellError> {
        self.session.open_positional(args)?;
        Ok(())
    }

    /// Flag polled while reading
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// The serial session
    pub fn session(&self) -> &SerialSession {
        &self.session
    }

    /// Entered lines
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Active highlight rules
    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    /// Known device commands
    pub fn dictionary(&self) -> &CommandDictionary {
        &self.dictionary
    }

    /// Dispatch table
    pub fn registry(&self) -> &CommandRegistry<Shell> {
        &self.registry
    }

    fn dispatch(&mut self, line: &str) -> Result<Flow, ShellError> {
        let invocation = Invocation::parse(line);
        let handler = self.registry.get(invocation.name).map(|e| e.handler);
        match handler {
            Some(handler) if !invocation.name.is_empty() => handler(self, &invocation),
            _ => {
                self.session.write(invocation.line, DEFAULT_LINE_ENDING)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn read_pass(&mut self, mode: ReadMode) -> Result<ReadSummary, ShellError> {
        let indent = self.session.prompt().len();
        let mut painted = Painted::new(self.sink.as_mut(), &self.highlights);
        let summary = self
            .session
            .read(mode, &self.interrupt, &mut painted, indent)?;
        if summary.outcome == ReadOutcome::Failed {
            tracing::warn!("Giving up reading after repeated errors");
        }
        Ok(summary)
    }

    fn say(&mut self, line: &str) {
        self.sink.emit(line);
    }
}

fn cmd_serial_open(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.open_positional(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_serial_close(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    if !shell.session.close() {
        tracing::debug!("No serial connection established yet");
    }
    Ok(Flow::Continue)
}

fn cmd_serial_info(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    let info = shell.session.info().ok_or(SessionError::NotConnected)?;
    shell.say(&info);
    Ok(Flow::Continue)
}

fn cmd_serial_read(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let summary = shell.read_pass(ReadMode::from_args(inv.args))?;
    tracing::debug!("read pass ended {:?} after {} line(s)", summary.outcome, summary.displayed);
    Ok(Flow::Continue)
}

fn cmd_serial_ports(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    let ports = list_ports()?;
    if ports.is_empty() {
        shell.say("No serial ports found");
    }
    for port in ports {
        shell.say(&format!("  {}", port.port_name));
    }
    Ok(Flow::Continue)
}

fn cmd_set_port(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_port(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_set_baudrate(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_baud_rate(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_set_bytesize(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_byte_size(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_set_parity(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_parity(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_set_stopbits(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_stop_bits(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_set_timeout(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.session.set_timeout(inv.args)?;
    Ok(Flow::Continue)
}

fn cmd_at(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell
        .session
        .write(&format!("at{}", inv.args), DEFAULT_LINE_ENDING)?;
    Ok(Flow::Continue)
}

fn cmd_nmea(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let sentence = nmea_sentence(inv.args);
    tracing::info!("nmea > \"{}<CR><LF>\"", sentence);
    shell.session.write(&sentence, NMEA_LINE_ENDING)?;
    Ok(Flow::Continue)
}

/// Forward the argument string typed after a dictionary command
fn cmd_dictionary_stub(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    if !shell.session.is_connected() {
        tracing::warn!("no connection");
        return Ok(Flow::Continue);
    }
    shell.session.write(inv.args, DEFAULT_LINE_ENDING)?;
    Ok(Flow::Continue)
}

fn cmd_dictionary(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let lines: Vec<String> = if inv.args.is_empty() {
        tracing::debug!("Empty search string");
        shell
            .dictionary
            .iter()
            .map(|(name, help)| format!("  {name}: {help}"))
            .collect()
    } else {
        tracing::debug!("Looking for {:?} in dictionary", inv.args);
        shell
            .dictionary
            .search(inv.args)
            .into_iter()
            .map(|(name, help)| format!("  {name}: {help}"))
            .collect()
    };

    if lines.is_empty() && !inv.args.is_empty() {
        shell.say("No match found");
    }
    for line in lines {
        shell.say(&line);
    }
    Ok(Flow::Continue)
}

fn cmd_help(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let topic = inv.args;
    if topic.is_empty() {
        let mut lines = vec!["Commands:".to_string()];
        lines.extend(
            shell
                .registry
                .entries(CommandOrigin::Builtin)
                .into_iter()
                .map(|e| format!("  {:<20}{}", e.name, e.brief)),
        );
        let known = shell.registry.entries(CommandOrigin::Dictionary);
        if !known.is_empty() {
            lines.push("Dictionary commands:".to_string());
            lines.push(format!(
                "  {}",
                known.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(" ")
            ));
        }
        for line in lines {
            shell.say(&line);
        }
        return Ok(Flow::Continue);
    }

    tracing::debug!("help for {}", topic);
    let help = match shell.dictionary.help_for(topic) {
        Some(help) => help.to_string(),
        None => shell
            .registry
            .get(topic)
            .map(|e| e.brief.clone())
            .ok_or_else(|| ShellError::UnknownCommand(topic.to_string()))?,
    };
    shell.say(&format!("\t{help}"));
    Ok(Flow::Continue)
}

fn cmd_history(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    let entries: Vec<String> = shell.history.entries().map(str::to_string).collect();
    for entry in entries {
        shell.say(&entry);
    }
    Ok(Flow::Continue)
}

fn cmd_clear_history(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    tracing::warn!("Clearing history");
    shell.history.clear();
    Ok(Flow::Continue)
}

fn cmd_set_history_length(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let length: i64 = inv
        .args
        .parse()
        .map_err(|_| ShellError::InvalidArgument(inv.args.to_string(), "expected an integer"))?;
    let max = usize::try_from(length).ok();
    shell.history.set_max_length(max);
    tracing::debug!("history length set to {:?}", max);
    Ok(Flow::Continue)
}

fn cmd_set_debug(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let enable = match inv.args.to_lowercase().as_str() {
        "" | "true" => true,
        "false" => false,
        _ => {
            return Err(ShellError::InvalidArgument(
                inv.args.to_string(),
                "expected True or False",
            ))
        }
    };
    match &shell.debug_switch {
        Some(switch) => switch(enable),
        None => tracing::debug!("No debug switch installed"),
    }
    Ok(Flow::Continue)
}

fn cmd_highlight(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    let rule: HighlightRule = inv.args.parse()?;
    tracing::debug!("highlighting {}", rule);
    shell.highlights.insert(rule);
    Ok(Flow::Continue)
}

fn cmd_show_highlight(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    let rules: Vec<String> = shell
        .highlights
        .rules()
        .iter()
        .map(|r| format!("  {r}"))
        .collect();
    if rules.is_empty() {
        shell.say("No highlight rules");
    }
    for rule in rules {
        shell.say(&rule);
    }
    Ok(Flow::Continue)
}

fn cmd_remove_highlight(shell: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    if !shell.highlights.remove(inv.args) {
        tracing::info!("Pattern {:?} is not highlighted", inv.args);
    }
    Ok(Flow::Continue)
}

fn cmd_shell(_: &mut Shell, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
    if inv.args.is_empty() {
        return Err(ShellError::InvalidArgument(String::new(), "expected a command"));
    }

    #[cfg(windows)]
    let status = std::process::Command::new("cmd").args(["/C", inv.args]).status()?;
    #[cfg(not(windows))]
    let status = std::process::Command::new("sh").args(["-c", inv.args]).status()?;

    if !status.success() {
        tracing::warn!("{:?} exited with {}", inv.args, status);
    }
    Ok(Flow::Continue)
}

fn cmd_exit(shell: &mut Shell, _: &Invocation<'_>) -> Result<Flow, ShellError> {
    shell.shutdown();
    Ok(Flow::Exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::SharedSink;
    use crate::core::transport::{MemoryConnector, MemoryTransport, Transport};

    fn shell_with(dictionary: &[&str]) -> (Shell, MemoryTransport, SharedSink) {
        let transport = MemoryTransport::new();
        let sink = SharedSink::new();
        let shell = Shell::new(
            Box::new(MemoryConnector::new(transport.clone())),
            CommandDictionary::parse(dictionary.iter().copied()),
            Box::new(sink.clone()),
        );
        (shell, transport, sink)
    }

    #[test]
    fn test_builtins_registered() {
        let (shell, _, _) = shell_with(&[]);
        for (name, _, _) in BUILTINS {
            assert!(shell.registry().contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_raw_fallback_needs_connection() {
        let (mut shell, transport, _) = shell_with(&[]);
        assert_eq!(shell.handle_line("+++"), Flow::Continue);
        assert!(transport.written().is_empty());
        assert_eq!(shell.prompt(), "(no-conn) ");
    }

    #[test]
    fn test_at_prefixes_lower_case() {
        let (mut shell, transport, _) = shell_with(&[]);
        shell.handle_line("serial_open /dev/ttyS1 9600");
        assert_eq!(shell.prompt(), "(/dev/ttyS1@9600) ");

        shell.handle_line("AT+CGMI");
        shell.handle_line("at");
        assert_eq!(transport.written(), vec!["at+CGMI\r", "at\r"]);
    }

    #[test]
    fn test_dictionary_stub_forwards_arguments() {
        let (mut shell, transport, _) = shell_with(&["ATE0 # echo off", "ATD # dial"]);
        shell.handle_line("ate0");
        assert!(transport.written().is_empty());

        shell.handle_line("serial_open mem0");
        shell.handle_line("ATD 5551234");
        shell.handle_line("atd ;");
        shell.handle_line("ate0");
        assert_eq!(transport.written(), vec!["5551234\r", ";\r", "\r"]);
    }

    #[test]
    fn test_interrupt_does_not_leak_into_next_line() {
        let (mut shell, transport, sink) = shell_with(&[]);
        shell.handle_line("serial_open mem0");

        shell.interrupt().trigger();
        shell.handle_line("history");
        assert!(!shell.interrupt().is_set());

        // Raised while idle, before the next line arrives
        shell.interrupt().trigger();
        transport.push_lines(&["OK"]);
        shell.handle_line("at");
        assert_eq!(transport.written(), vec!["at\r"]);
        assert_eq!(sink.lines().last().map(|l| l.trim()), Some("OK"));
        assert!(!shell.interrupt().is_set());
    }

    #[test]
    fn test_help_prefers_dictionary() {
        let (mut shell, _, sink) = shell_with(&["ATI # identification"]);
        shell.handle_line("help ati");
        shell.handle_line("help serial_close");
        shell.handle_line("help nothing_like_this");
        assert_eq!(
            sink.lines(),
            vec![
                "\tidentification".to_string(),
                "\tClose the serial connection (if any)".to_string()
            ]
        );
    }

    #[test]
    fn test_dictionary_search_output() {
        let (mut shell, _, sink) = shell_with(&["AT+CGMI # manufacturer", "ATI # identification"]);
        shell.handle_line("dictionary manu");
        assert_eq!(sink.drain(), vec!["  AT+CGMI: manufacturer".to_string()]);

        shell.handle_line("dictionary qwerty");
        assert_eq!(sink.drain(), vec!["No match found".to_string()]);

        shell.handle_line("dictionary");
        assert_eq!(sink.drain().len(), 2);
    }

    #[test]
    fn test_history_commands() {
        let (mut shell, _, sink) = shell_with(&[]);
        shell.handle_line("set_history_length 2");
        shell.handle_line("serial_close");
        shell.handle_line("history");
        assert_eq!(
            sink.drain(),
            vec!["serial_close".to_string(), "history".to_string()]
        );

        shell.handle_line("clear_history");
        assert!(shell.history().is_empty());

        shell.handle_line("set_history_length lots");
        assert_eq!(shell.history().max_length(), Some(2));
        shell.handle_line("set_history_length -1");
        assert_eq!(shell.history().max_length(), None);
    }

    #[test]
    fn test_highlight_commands() {
        let (mut shell, _, sink) = shell_with(&[]);
        shell.handle_line("highlight ERROR=>red");
        shell.handle_line("highlight broken");
        shell.handle_line("show_highlight");
        assert_eq!(sink.drain(), vec!["  ERROR=>red".to_string()]);

        shell.handle_line("remove_highlight ERROR");
        shell.handle_line("show_highlight");
        assert_eq!(sink.drain(), vec!["No highlight rules".to_string()]);
    }

    #[test]
    fn test_set_debug_calls_switch() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(None));
        let seen_by_switch = Rc::clone(&seen);
        let (shell, _, _) = shell_with(&[]);
        let mut shell =
            shell.with_debug_switch(Box::new(move |on| seen_by_switch.set(Some(on))));

        shell.handle_line("set_debug False");
        assert_eq!(seen.get(), Some(false));
        shell.handle_line("set_debug");
        assert_eq!(seen.get(), Some(true));
        seen.set(None);
        shell.handle_line("set_debug maybe");
        assert_eq!(seen.get(), None);
    }

    #[test]
    fn test_exit_closes_connection() {
        let (mut shell, transport, _) = shell_with(&[]);
        shell.handle_line("serial_open mem0");
        assert!(shell.session().is_connected());
        assert_eq!(shell.handle_line("quit"), Flow::Exit);
        assert!(!transport.is_open());
    }
}
