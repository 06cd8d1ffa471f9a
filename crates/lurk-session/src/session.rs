use std::thread;
use std::time::Duration;

use lurk_transport::{LurkStream, DEFAULT_MAX_RECEIVE};
use tracing::{debug, info, warn};

use crate::commands::CommandTable;
use crate::error::{Result, SessionError};
use crate::query::{run_query, GameInfo, QUERY_FRAME};
use crate::receiver;
use crate::state::{SessionHandle, SessionState, Shared};

/// Shown after the game description once setup completes.
pub const HELP_HINT: &str = "Enter cmds for a list of commands";

/// Input line that lists the command table instead of being sent.
pub const LIST_COMMANDS: &str = "cmds";

/// Commands that only make sense before `start` has been sent.
pub const SETUP_COMMANDS: [&str; 5] = ["login", "setattack", "setdefense", "setregen", "start"];

const ALREADY_STARTED: &str = "Invalid command: You have already started!";

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for a single receive call.
    pub max_receive: usize,
    /// How long the dispatch loop sleeps when it had nothing to do.
    pub poll_interval: Duration,
    /// Frame sent to request the game description and extensions.
    pub query_frame: String,
    /// Per-address connect timeout. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_receive: DEFAULT_MAX_RECEIVE,
            poll_interval: Duration::from_millis(10),
            query_frame: QUERY_FRAME.to_string(),
            connect_timeout: None,
        }
    }
}

/// One connected game session.
///
/// Lifecycle: [`setup`](Session::setup) sends the query and registers
/// extensions, then [`run`](Session::run) starts the receive loop and runs
/// the dispatch loop on the calling thread until the session finishes. The
/// display side talks to a running session through a [`SessionHandle`].
pub struct Session {
    stream: LurkStream,
    commands: CommandTable,
    config: SessionConfig,
    handle: SessionHandle,
    info: Option<GameInfo>,
}

enum Action {
    Send {
        text: String,
        start: bool,
        logout: bool,
    },
    Handled,
}

impl Session {
    /// Create a session over an established stream, with the built-in commands.
    pub fn new(stream: LurkStream, config: SessionConfig) -> Self {
        Self {
            stream,
            commands: CommandTable::with_builtins(),
            config,
            handle: SessionHandle::default(),
            info: None,
        }
    }

    /// A handle for submitting input and draining display lines.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandTable {
        &mut self.commands
    }

    /// The setup result, once [`setup`](Session::setup) has succeeded.
    pub fn game_info(&self) -> Option<&GameInfo> {
        self.info.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Address of the connected server.
    pub fn peer(&self) -> &str {
        self.stream.peer()
    }

    /// Query the server and register its extensions.
    ///
    /// On failure the session is finished and the connection closed.
    pub fn setup(&mut self) -> Result<GameInfo> {
        self.expect_state(SessionState::NotStarted)?;
        self.handle
            .with(|shared| shared.transition(SessionState::AwaitingExtensions));

        match self.query() {
            Ok(info) => Ok(info),
            Err(err) => {
                warn!(error = %err, "session setup failed");
                self.handle.fail(err.to_string());
                self.close();
                Err(err)
            }
        }
    }

    fn query(&mut self) -> Result<GameInfo> {
        let (listing, others) =
            run_query(&mut self.stream, &self.config.query_frame, self.config.max_receive)?;

        let info = GameInfo::parse(&listing.text());
        let added = info.register(&mut self.commands);
        info!(
            extensions = info.extensions.len(),
            registered = added,
            "game setup received"
        );

        if !others.is_empty() {
            self.handle.with(|shared| {
                shared
                    .messages
                    .extend(others.iter().map(|b| b.text().into_owned()));
                shared.stats.frames_received += others.len() as u64;
            });
        }

        self.info = Some(info.clone());
        Ok(info)
    }

    /// Run the session until it finishes.
    ///
    /// Runs [`setup`](Session::setup) first if it has not happened yet. The
    /// dispatch loop runs on the calling thread; server data is received on a
    /// background thread. Returns the transport error that ended the session,
    /// if any.
    pub fn run(mut self) -> Result<()> {
        if self.state() == SessionState::NotStarted {
            self.setup()?;
        }
        if self.handle.is_finished() {
            self.close();
            return Ok(());
        }
        self.expect_state(SessionState::AwaitingExtensions)?;

        let description = self
            .info
            .as_ref()
            .map(|info| info.description.clone())
            .unwrap_or_default();
        self.handle.with(|shared| {
            shared.output.push_back(description);
            shared.output.push_back(HELP_HINT.to_string());
            shared.transition(SessionState::Running);
        });

        let reader = match self.stream.try_clone() {
            Ok(reader) => reader,
            Err(err) => {
                self.handle.fail(err.to_string());
                self.close();
                return Err(err.into());
            }
        };
        let receiver = match receiver::spawn(reader, self.handle(), self.config.max_receive) {
            Ok(receiver) => receiver,
            Err(err) => {
                self.handle.fail(err.to_string());
                self.close();
                return Err(err);
            }
        };

        let dispatched = self.dispatch_loop();

        self.close();
        let received = receiver.join().map_err(|_| SessionError::ReceiverPanicked)?;
        self.handle.with(|shared| {
            let late = std::mem::take(&mut shared.messages);
            shared.output.extend(late);
        });
        info!(stats = ?self.handle.stats(), "session finished");

        dispatched.and(received)
    }

    /// Shut the connection down and mark the session finished. Idempotent.
    pub fn close(&self) {
        self.handle.request_end();
        if let Err(err) = self.stream.shutdown() {
            debug!(error = %err, "shutdown failed");
        }
    }

    fn dispatch_loop(&mut self) -> Result<()> {
        loop {
            let (command, moved) = {
                let commands = &self.commands;
                let step = self.handle.with(|shared| {
                    let moved = shared.messages.len();
                    let messages = std::mem::take(&mut shared.messages);
                    shared.output.extend(messages);
                    if shared.is_finished() {
                        return None;
                    }
                    let command = shared
                        .input
                        .pop_front()
                        .map(|line| plan_command(shared, commands, &line));
                    Some((command, moved))
                });
                match step {
                    Some(step) => step,
                    None => return Ok(()),
                }
            };

            let idle = command.is_none() && moved == 0;
            if let Some(Action::Send {
                text,
                start,
                logout,
            }) = command
            {
                self.send_command(&text, start, logout)?;
            }

            if idle {
                thread::sleep(self.config.poll_interval);
            }
        }
    }

    fn send_command(&mut self, text: &str, start: bool, logout: bool) -> Result<()> {
        if let Err(err) = self.stream.send(text) {
            warn!(error = %err, "send failed, ending session");
            self.handle.fail(err.to_string());
            return Err(err.into());
        }

        self.handle.with(|shared| {
            shared.stats.commands_sent += 1;
            if start {
                shared.started = true;
            }
            if logout {
                shared.transition(SessionState::Finished);
            }
        });
        Ok(())
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        let found = self.state();
        if found != expected {
            return Err(SessionError::InvalidState { expected, found });
        }
        Ok(())
    }
}

/// Decide what to do with one input line. Runs under the session lock and
/// never touches the network.
fn plan_command(shared: &mut Shared, commands: &CommandTable, line: &str) -> Action {
    let line = line.trim();
    if line.is_empty() {
        return Action::Handled;
    }
    if line == LIST_COMMANDS {
        shared.output.push_back(commands.describe());
        return Action::Handled;
    }

    let name = line.split_whitespace().next().unwrap_or_default();
    if shared.started && SETUP_COMMANDS.contains(&name) {
        shared.stats.commands_rejected += 1;
        shared.output.push_back(ALREADY_STARTED.to_string());
        return Action::Handled;
    }

    match commands.translate(line) {
        Ok(text) => Action::Send {
            text,
            start: name == "start",
            logout: name == "logout",
        },
        Err(err) => {
            debug!(error = %err, "rejected user command");
            shared.stats.commands_rejected += 1;
            shared.output.push_back(format!("Invalid command: {line}"));
            Action::Handled
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stream", &self.stream)
            .field("state", &self.state())
            .field("commands", &self.commands.len())
            .field("config", &self.config)
            .finish()
    }
}
