//! Table-driven SCPI commands.
//!
//! Every instrument is described by a static [`CommandTable`]: one [`CommandSpec`] per
//! operation holding the SCPI template, a validator per argument and the expected reply
//! shape. A [`Session`] validates arguments against its table before anything reaches the wire,
//! so a rejected value never produces a half-applied command.

use crate::conversion::ConversionError;
use crate::transport::{Transport, TransportError};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("{model} has no command named '{name}'")]
    UnknownCommand { model: String, name: String },

    #[error("Query '{command}' failed: {source}")]
    Query {
        command: String,
        source: TransportError,
    },

    #[error("Write '{command}' failed: {source}")]
    Write {
        command: String,
        source: TransportError,
    },

    #[error("Unexpected reply: {0}")]
    Parse(String),

    #[error("Memory read aborted at chunk {chunk} (points {start}..={stop}): {source}")]
    Transfer {
        chunk: usize,
        start: u64,
        stop: u64,
        source: Box<InstrumentError>,
    },

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Failed to close connection: {0}")]
    Close(#[source] TransportError),
}

/// Accepted values of one command argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgSpec {
    /// Case-insensitive allow-list; the listed spelling is what gets sent.
    Choice(&'static [&'static str]),
    Integer {
        min: i64,
        max: i64,
    },
    Float {
        min: f64,
        max: f64,
        decimals: Option<usize>,
    },
    /// A value in `min..=max` or one of the keywords (MIN, MAX, DEF, ...).
    Number {
        min: f64,
        max: f64,
        keywords: &'static [&'static str],
    },
    Switch {
        on: &'static str,
        off: &'static str,
    },
}

/// An argument value handed to [`Session::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Flag(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u8> for Arg {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        // Anything beyond i64 is out of every range a table declares.
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl Arg {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Flag(_) => None,
        }
    }
}

impl ArgSpec {
    /// Render `arg` the way it must appear in the command, or explain the rejection.
    pub fn render(&self, arg: &Arg) -> Result<String, String> {
        match *self {
            Self::Choice(choices) => {
                let text = arg.to_string();
                choices
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(text.trim()))
                    .map(|c| (*c).to_string())
                    .ok_or_else(|| format!("'{}' is not one of {:?}", text, choices))
            }
            Self::Integer { min, max } => {
                let value = match arg {
                    Arg::Int(v) => Some(*v),
                    Arg::Text(t) => t.trim().parse().ok(),
                    Arg::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
                    _ => None,
                }
                .ok_or_else(|| format!("'{}' is not an integer", arg))?;
                if (min..=max).contains(&value) {
                    Ok(value.to_string())
                } else {
                    Err(format!("{} is outside [{}, {}]", value, min, max))
                }
            }
            Self::Float { min, max, decimals } => {
                let value = arg
                    .as_number()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| format!("'{}' is not a number", arg))?;
                if !(min..=max).contains(&value) {
                    return Err(format!("{} is outside [{}, {}]", value, min, max));
                }
                Ok(match decimals {
                    Some(places) => format!("{:.*}", places, value),
                    None => value.to_string(),
                })
            }
            Self::Number { min, max, keywords } => {
                if let Arg::Text(text) = arg {
                    if let Some(k) = keywords.iter().find(|k| k.eq_ignore_ascii_case(text.trim())) {
                        return Ok((*k).to_string());
                    }
                }
                let value = arg.as_number().filter(|v| v.is_finite()).ok_or_else(|| {
                    format!("'{}' is neither a number nor one of {:?}", arg, keywords)
                })?;
                if (min..=max).contains(&value) {
                    Ok(value.to_string())
                } else {
                    Err(format!("{} is outside [{}, {}]", value, min, max))
                }
            }
            Self::Switch { on, off } => match arg {
                Arg::Flag(true) | Arg::Int(1) => Ok(on.to_string()),
                Arg::Flag(false) | Arg::Int(0) => Ok(off.to_string()),
                Arg::Text(t) if t.eq_ignore_ascii_case(on) || t.trim() == "1" => Ok(on.to_string()),
                Arg::Text(t) if t.eq_ignore_ascii_case(off) || t.trim() == "0" => {
                    Ok(off.to_string())
                }
                other => Err(format!("'{}' is not {}/{}", other, on, off)),
            },
        }
    }
}

/// Shape of the instrument's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Write-only command, nothing is read back.
    Ack,
    Text,
    Float,
    Integer,
    Flag,
    /// Comma-separated fields.
    List,
    /// IEEE-488.2 binary block.
    Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack,
    Text(String),
    Float(f64),
    Integer(i64),
    Flag(bool),
    List(Vec<String>),
    Block(Vec<u8>),
}

impl Response {
    fn parse(kind: ReplyKind, reply: String) -> Result<Self, InstrumentError> {
        if kind == ReplyKind::Block {
            return Ok(Self::Block(reply.into_bytes()));
        }
        let trimmed = reply.trim();
        let bad = |what: &str| InstrumentError::Parse(format!("'{}' is not {}", trimmed, what));
        match kind {
            ReplyKind::Ack => Ok(Self::Ack),
            ReplyKind::Text => Ok(Self::Text(trimmed.to_string())),
            ReplyKind::Float => trimmed
                .parse()
                .map(Self::Float)
                .map_err(|_| bad("a number")),
            ReplyKind::Integer => parse_integer(trimmed)
                .map(Self::Integer)
                .ok_or_else(|| bad("an integer")),
            ReplyKind::Flag => match trimmed.to_ascii_uppercase().as_str() {
                "1" | "ON" => Ok(Self::Flag(true)),
                "0" | "OFF" => Ok(Self::Flag(false)),
                _ => Err(bad("a flag")),
            },
            ReplyKind::List => Ok(Self::List(
                trimmed.split(',').map(|f| f.trim().to_string()).collect(),
            )),
            ReplyKind::Block => Ok(Self::Block(trimmed.as_bytes().to_vec())),
        }
    }

    fn mismatch(&self, wanted: &str) -> InstrumentError {
        InstrumentError::Parse(format!("expected {} reply, got {:?}", wanted, self))
    }

    pub fn into_text(self) -> Result<String, InstrumentError> {
        match self {
            Self::Text(t) => Ok(t),
            Self::List(fields) => Ok(fields.join(",")),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_f64(self) -> Result<f64, InstrumentError> {
        match self {
            Self::Float(v) => Ok(v),
            Self::Integer(v) => Ok(v as f64),
            other => Err(other.mismatch("numeric")),
        }
    }

    pub fn into_i64(self) -> Result<i64, InstrumentError> {
        match self {
            Self::Integer(v) => Ok(v),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn into_bool(self) -> Result<bool, InstrumentError> {
        match self {
            Self::Flag(v) => Ok(v),
            other => Err(other.mismatch("flag")),
        }
    }

    pub fn into_list(self) -> Result<Vec<String>, InstrumentError> {
        match self {
            Self::List(v) => Ok(v),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_block(self) -> Result<Vec<u8>, InstrumentError> {
        match self {
            Self::Block(v) => Ok(v),
            other => Err(other.mismatch("binary block")),
        }
    }
}

/// Integers sometimes come back in float notation (`1.200000e+03`).
pub(crate) fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15)
            .map(|v| v as i64)
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    /// SCPI text; each `{}` is replaced by the next rendered argument.
    pub template: &'static str,
    pub args: &'static [ArgSpec],
    pub reply: ReplyKind,
}

impl CommandSpec {
    pub const fn write(name: &'static str, template: &'static str, args: &'static [ArgSpec]) -> Self {
        Self {
            name,
            template,
            args,
            reply: ReplyKind::Ack,
        }
    }

    pub const fn query(name: &'static str, template: &'static str, reply: ReplyKind) -> Self {
        Self {
            name,
            template,
            args: &[],
            reply,
        }
    }

    pub const fn query_with(
        name: &'static str,
        template: &'static str,
        args: &'static [ArgSpec],
        reply: ReplyKind,
    ) -> Self {
        Self {
            name,
            template,
            args,
            reply,
        }
    }

    /// Validate `args` and produce the command text.
    pub fn render(&self, args: &[Arg]) -> Result<String, InstrumentError> {
        if args.len() != self.args.len() {
            return Err(InstrumentError::Validation(format!(
                "{} takes {} argument(s), got {}",
                self.name,
                self.args.len(),
                args.len()
            )));
        }

        let mut rendered = Vec::with_capacity(args.len());
        for (i, (spec, arg)) in self.args.iter().zip(args).enumerate() {
            let text = spec.render(arg).map_err(|reason| {
                InstrumentError::Validation(format!("{} argument {}: {}", self.name, i + 1, reason))
            })?;
            rendered.push(text);
        }

        let mut pieces = self.template.split("{}");
        let mut command = pieces.next().unwrap_or_default().to_string();
        for (piece, value) in pieces.zip(rendered) {
            command.push_str(&value);
            command.push_str(piece);
        }
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    pub model: &'static str,
    pub commands: &'static [CommandSpec],
}

impl CommandTable {
    pub fn get(&self, name: &str) -> Option<&'static CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// An open connection to one instrument, speaking the commands of its table.
pub struct Session<T: Transport> {
    transport: T,
    table: &'static CommandTable,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, table: &'static CommandTable) -> Self {
        log::debug!("Opened {} session", table.model);
        Self {
            transport,
            table,
            closed: false,
        }
    }

    pub fn table(&self) -> &'static CommandTable {
        self.table
    }

    /// Run the command `name` of this instrument's table.
    pub fn execute(&mut self, name: &str, args: &[Arg]) -> Result<Response, InstrumentError> {
        let spec = self
            .table
            .get(name)
            .ok_or_else(|| InstrumentError::UnknownCommand {
                model: self.table.model.to_string(),
                name: name.to_string(),
            })?;
        let command = spec.render(args)?;

        match spec.reply {
            ReplyKind::Ack => {
                self.transport
                    .write(&command)
                    .map_err(|source| InstrumentError::Write {
                        command: command.clone(),
                        source,
                    })?;
                Ok(Response::Ack)
            }
            ReplyKind::Block => {
                let data = self
                    .transport
                    .read_binary_block(&command)
                    .map_err(|source| InstrumentError::Query {
                        command: command.clone(),
                        source,
                    })?;
                Ok(Response::Block(data))
            }
            kind => {
                let reply = self
                    .transport
                    .query(&command)
                    .map_err(|source| InstrumentError::Query {
                        command: command.clone(),
                        source,
                    })?;
                Response::parse(kind, reply)
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the connection now instead of on drop.
    pub fn close(mut self) -> Result<(), InstrumentError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), InstrumentError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::debug!("Closing {} session", self.table.model);
        self.transport.close().map_err(InstrumentError::Close)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("{}", e);
        }
    }
}
