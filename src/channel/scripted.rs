use std::collections::{HashMap, HashSet};
use std::io;

use super::{ChannelError, DeviceLink};

/// In-memory peer answering whole commands from a table. Unscripted commands get an
/// empty reply; commands in `failing` fail at the transport.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    answers: HashMap<String, String>,
    failing: HashSet<String>,
    pub sent: Vec<String>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, command: &str, response: &str) -> Self {
        self.answers.insert(command.to_string(), response.to_string());
        self
    }

    pub fn status(self, port: &str, response: &str) -> Self {
        self.answer(&format!("get status {port}"), response)
    }

    pub fn setting(self, key: &str, value: &str) -> Self {
        self.answer(&format!("get {key}"), &format!("{key} {value}"))
    }

    pub fn fail(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }
}

impl DeviceLink for ScriptedLink {
    fn send_command(&mut self, command: &str) -> Result<String, ChannelError> {
        self.sent.push(command.to_string());
        if self.failing.contains(command) {
            return Err(ChannelError::Io {
                addr: "10.0.0.9:2222".into(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            });
        }
        Ok(self.answers.get(command).cloned().unwrap_or_default())
    }
}
