//! User command table and command-to-protocol translation.
//!
//! A command line such as `message bob hello there` is looked up by its first
//! word and rewritten as `<protocol header> <args...>`. The table starts with
//! the built-in Lurk commands and grows with extensions the server advertises
//! during setup.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::CommandError;

/// Built-in commands: (name, protocol header, required arguments, description).
pub const BUILTIN_COMMANDS: [(&str, &str, usize, &str); 11] = [
    ("login", "CNNCT", 1, "Login as character"),
    ("logout", "LEAVE", 0, "Logout of the game"),
    ("setattack", "ATTCK", 1, "Set the attack stat"),
    ("setdefense", "DEFNS", 1, "Set the defense stat"),
    ("setdescription", "DESCR", 1, "Set the character's description"),
    ("setregen", "REGEN", 1, "Set the regen stat"),
    ("start", "START", 1, "Start playing the game"),
    ("goto", "ACTON CHROM", 1, "Go to a connected room"),
    ("message", "ACTON MESSG", 2, "Message character"),
    (
        "fight",
        "ACTON FIGHT",
        0,
        "Fight every willing participant in the room",
    ),
    (
        "joinbattle",
        "JOINB",
        1,
        "Set whether or not to join a battle (0 or 1)",
    ),
];

/// One registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// The word the user types.
    pub name: String,
    /// Protocol header the command is translated to (may contain a space, e.g. `ACTON FIGHT`).
    pub header: String,
    /// Minimum number of arguments after the command name.
    pub params: usize,
    /// Human-readable description.
    pub description: String,
}

/// Command table in registration order.
#[derive(Debug, Clone)]
pub struct CommandTable {
    specs: Vec<CommandSpec>,
    index: HashMap<String, usize>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandTable {
    /// A table with no commands.
    pub fn empty() -> Self {
        Self {
            specs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// A table seeded with [`BUILTIN_COMMANDS`].
    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        for (name, header, params, description) in BUILTIN_COMMANDS {
            table.specs.push(CommandSpec {
                name: name.to_string(),
                header: header.to_string(),
                params,
                description: description.to_string(),
            });
            table.index.insert(name.to_string(), table.specs.len() - 1);
        }
        table
    }

    /// Register a new command. Fails if `name` is already registered.
    pub fn add_command(
        &mut self,
        name: &str,
        header: &str,
        params: usize,
        description: &str,
    ) -> Result<(), CommandError> {
        let spec = build_spec(name, header, params, description)?;
        if self.index.contains_key(&spec.name) {
            return Err(CommandError::DuplicateCommand(spec.name));
        }
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    /// Register a command, overwriting any existing entry with the same name.
    ///
    /// Returns the replaced entry. A replaced command keeps its position.
    pub fn replace_command(
        &mut self,
        name: &str,
        header: &str,
        params: usize,
        description: &str,
    ) -> Result<Option<CommandSpec>, CommandError> {
        let spec = build_spec(name, header, params, description)?;
        match self.index.get(&spec.name) {
            Some(&slot) => Ok(Some(std::mem::replace(&mut self.specs[slot], spec))),
            None => {
                self.index.insert(spec.name.clone(), self.specs.len());
                self.specs.push(spec);
                Ok(None)
            }
        }
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.index.get(name).map(|&slot| &self.specs[slot])
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Translate a user input line to protocol text.
    pub fn translate(&self, line: &str) -> Result<String, CommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;
        let spec = self
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        let args: Vec<&str> = words.collect();
        if args.len() < spec.params {
            return Err(CommandError::MissingArguments {
                name: spec.name.clone(),
                required: spec.params,
                given: args.len(),
            });
        }

        let mut text = spec.header.clone();
        for arg in args {
            text.push(' ');
            text.push_str(arg);
        }
        Ok(text)
    }

    /// Translate a user input line, or `None` if it is not a valid command.
    pub fn to_protocol(&self, line: &str) -> Option<String> {
        self.translate(line).ok()
    }

    /// Render every command as `name:\n\tdescription\n`, in registration order.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for spec in &self.specs {
            let _ = write!(out, "{}:\n\t{}\n", spec.name, spec.description);
        }
        out
    }

    /// Iterate commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn build_spec(
    name: &str,
    header: &str,
    params: usize,
    description: &str,
) -> Result<CommandSpec, CommandError> {
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(CommandError::InvalidName(name.to_string()));
    }
    let header = header.trim();
    if header.is_empty() {
        return Err(CommandError::EmptyHeader(name.to_string()));
    }
    Ok(CommandSpec {
        name: name.to_string(),
        header: header.to_string(),
        params,
        description: description.trim().to_string(),
    })
}
