//! Command registry
//!
//! Maps typed command names to handler functions. Built-ins are registered by
//! the shell; the dictionary contributes one stub per eligible entry, under
//! its own spelling and the opposite case.

use super::dictionary::CommandDictionary;
use super::shell::{Flow, ShellError};
use std::collections::HashMap;

/// Characters that keep a dictionary entry from becoming a command
pub const RESERVED_SYMBOLS: [char; 6] = ['+', '%', '&', '$', '#', '/'];

/// A command handler operating on context `C`
pub type Handler<C> = fn(&mut C, &Invocation<'_>) -> Result<Flow, ShellError>;

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Command token as typed
    pub name: &'a str,
    /// Remainder of the line, trimmed
    pub args: &'a str,
    /// The whole line, trimmed
    pub line: &'a str,
}

impl<'a> Invocation<'a> {
    /// Split a line into command token and arguments.
    ///
    /// The token is the leading run of ASCII alphanumerics and `_`, so
    /// `AT+CGMI` yields `AT` with `+CGMI` and `ATS0=1` yields `ATS0` with `=1`.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(line.len());
        Self {
            name: &line[..end],
            args: line[end..].trim(),
            line,
        }
    }
}

/// Where a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Part of the shell
    Builtin,
    /// Generated from the dictionary
    Dictionary,
}

/// Registered command
pub struct CommandEntry<C> {
    /// Name the command is dispatched under
    pub name: String,
    /// One line description
    pub brief: String,
    /// Origin
    pub origin: CommandOrigin,
    /// Handler
    pub handler: Handler<C>,
}

impl<C> Clone for CommandEntry<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            brief: self.brief.clone(),
            origin: self.origin,
            handler: self.handler,
        }
    }
}

/// Name → handler table
pub struct CommandRegistry<C> {
    commands: HashMap<String, CommandEntry<C>>,
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }
}

impl<C> CommandRegistry<C> {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in, replacing any previous entry
    pub fn register_builtin(&mut self, name: &str, brief: &str, handler: Handler<C>) {
        self.commands.insert(
            name.to_string(),
            CommandEntry {
                name: name.to_string(),
                brief: brief.to_string(),
                origin: CommandOrigin::Builtin,
                handler,
            },
        );
    }

    /// Install `handler` for every dispatchable dictionary entry.
    ///
    /// Returns the number of names added. Built-ins are never shadowed.
    pub fn register_dictionary(
        &mut self,
        dictionary: &CommandDictionary,
        handler: Handler<C>,
    ) -> usize {
        let mut added = 0;
        for (name, help) in dictionary.iter() {
            if !is_dispatchable(name) {
                tracing::debug!("{} contains reserved symbols, not adding a command", name);
                continue;
            }

            for variant in [name.to_string(), opposite_case(name)] {
                if self.commands.contains_key(&variant) {
                    if self.commands[&variant].origin == CommandOrigin::Builtin {
                        tracing::debug!("{} is a built-in, keeping it", variant);
                    }
                    continue;
                }
                tracing::debug!("Adding {}", variant);
                self.commands.insert(
                    variant.clone(),
                    CommandEntry {
                        name: variant,
                        brief: help.to_string(),
                        origin: CommandOrigin::Dictionary,
                        handler,
                    },
                );
                added += 1;
            }
        }
        added
    }

    /// Look up an exact name
    pub fn get(&self, name: &str) -> Option<&CommandEntry<C>> {
        self.commands.get(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Entries of one origin, sorted by name
    pub fn entries(&self, origin: CommandOrigin) -> Vec<&CommandEntry<C>> {
        let mut entries: Vec<_> = self
            .commands
            .values()
            .filter(|e| e.origin == origin)
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Whether a dictionary name may become a command
pub fn is_dispatchable(name: &str) -> bool {
    !name.contains(RESERVED_SYMBOLS)
}

/// `ATE0` → `ate0`; anything not fully upper case → upper case
pub fn opposite_case(name: &str) -> String {
    let has_upper = name.chars().any(char::is_uppercase);
    let has_lower = name.chars().any(char::is_lowercase);
    if has_upper && !has_lower {
        name.to_lowercase()
    } else {
        name.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Calls(Vec<String>);

    fn record(ctx: &mut Calls, inv: &Invocation<'_>) -> Result<Flow, ShellError> {
        ctx.0.push(format!("{}|{}", inv.name, inv.args));
        Ok(Flow::Continue)
    }

    fn builtin(_: &mut Calls, _: &Invocation<'_>) -> Result<Flow, ShellError> {
        Ok(Flow::Exit)
    }

    #[test]
    fn test_parse_line() {
        let inv = Invocation::parse("  serial_open /dev/ttyUSB0 9600  ");
        assert_eq!(inv.name, "serial_open");
        assert_eq!(inv.args, "/dev/ttyUSB0 9600");

        let inv = Invocation::parse("AT+CGMI");
        assert_eq!((inv.name, inv.args), ("AT", "+CGMI"));

        let inv = Invocation::parse("ATS0=1");
        assert_eq!((inv.name, inv.args), ("ATS0", "=1"));

        let inv = Invocation::parse("+++");
        assert_eq!((inv.name, inv.args, inv.line), ("", "+++", "+++"));

        let inv = Invocation::parse("");
        assert_eq!(inv.name, "");
    }

    #[test]
    fn test_opposite_case() {
        assert_eq!(opposite_case("ATE0"), "ate0");
        assert_eq!(opposite_case("ate0"), "ATE0");
        assert_eq!(opposite_case("AtI"), "ATI");
        assert_eq!(opposite_case("123"), "123");
    }

    #[test]
    fn test_reserved_symbols_excluded() {
        let dictionary = CommandDictionary::parse([
            "AT+CGMI # manufacturer",
            "AT&F # factory",
            "AT%X",
            "AT$Y",
            "AT/Z",
            "ATE0 # echo off",
        ]);
        let mut registry: CommandRegistry<Calls> = CommandRegistry::new();
        let added = registry.register_dictionary(&dictionary, record);

        assert_eq!(added, 2);
        assert!(registry.contains("ATE0"));
        assert!(registry.contains("ate0"));
        assert!(!registry.contains("AT+CGMI"));
        assert!(!registry.contains("at+cgmi"));
        assert!(!registry.contains("AT&F"));
        assert_eq!(registry.get("ate0").unwrap().brief, "echo off");
    }

    #[test]
    fn test_builtins_not_shadowed() {
        let dictionary = CommandDictionary::parse(["AT # probe"]);
        let mut registry: CommandRegistry<Calls> = CommandRegistry::new();
        registry.register_builtin("at", "Send AT command", builtin);
        registry.register_builtin("AT", "Send AT command", builtin);

        assert_eq!(registry.register_dictionary(&dictionary, record), 0);
        assert_eq!(registry.get("AT").unwrap().origin, CommandOrigin::Builtin);
    }

    #[test]
    fn test_dispatch_through_registry() {
        let dictionary = CommandDictionary::parse(["ATD # dial"]);
        let mut registry: CommandRegistry<Calls> = CommandRegistry::new();
        registry.register_dictionary(&dictionary, record);

        let mut calls = Calls::default();
        let inv = Invocation::parse("atd 5551234");
        let handler = registry.get(inv.name).unwrap().handler;
        assert_eq!(handler(&mut calls, &inv).unwrap(), Flow::Continue);
        assert_eq!(calls.0, vec!["atd|5551234".to_string()]);

        assert_eq!(registry.entries(CommandOrigin::Dictionary).len(), 2);
    }
}
