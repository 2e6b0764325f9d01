//! # Command and state codes.
//!
//! The wire-level vocabulary clients use to drive the command channels
//! (`CommandOp/Int/Ext`), read `CommandEn` and read `StateCur`.
//!
//! ```text
//! Command   code     State       code     State        code
//! reset        2     stopped        4     held         2048
//! start        4     starting       8     unholding    4096
//! stop         8     idle          16     pausing      8192
//! hold        16     paused        32     resuming    16384
//! unhold      32     execute       64     resetting   32768
//! pause       64     stopping     128     completing  65536
//! resume     128     aborting     256     completed  131072
//! abort      256     aborted      512
//! restart    512     holding     1024
//! complete  1024
//! ```
//!
//! Command codes are single bits so a set of enabled commands is a plain
//! bitmask (`CommandEn`). Code `0` on a command channel means "no command".

use std::fmt;
use std::str::FromStr;

/// Lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    Reset,
    Start,
    Stop,
    Hold,
    Unhold,
    Pause,
    Resume,
    Abort,
    Restart,
    Complete,
}

impl Command {
    /// All commands in code order.
    pub const ALL: [Command; 10] = [
        Command::Reset,
        Command::Start,
        Command::Stop,
        Command::Hold,
        Command::Unhold,
        Command::Pause,
        Command::Resume,
        Command::Abort,
        Command::Restart,
        Command::Complete,
    ];

    /// Numeric code (also the command's bit in `CommandEn`).
    pub const fn code(self) -> i64 {
        match self {
            Command::Reset => 2,
            Command::Start => 4,
            Command::Stop => 8,
            Command::Hold => 16,
            Command::Unhold => 32,
            Command::Pause => 64,
            Command::Resume => 128,
            Command::Abort => 256,
            Command::Restart => 512,
            Command::Complete => 1024,
        }
    }

    pub fn from_code(code: i64) -> Option<Command> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Command::Reset => "reset",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Hold => "hold",
            Command::Unhold => "unhold",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Abort => "abort",
            Command::Restart => "restart",
            Command::Complete => "complete",
        }
    }

    pub fn from_name(name: &str) -> Option<Command> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::from_name(s).ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    Stopped,
    Starting,
    Idle,
    Paused,
    Execute,
    Stopping,
    Aborting,
    Aborted,
    Holding,
    Held,
    Unholding,
    Pausing,
    Resuming,
    Resetting,
    Completing,
    Completed,
}

impl State {
    /// All states in code order.
    pub const ALL: [State; 16] = [
        State::Stopped,
        State::Starting,
        State::Idle,
        State::Paused,
        State::Execute,
        State::Stopping,
        State::Aborting,
        State::Aborted,
        State::Holding,
        State::Held,
        State::Unholding,
        State::Pausing,
        State::Resuming,
        State::Resetting,
        State::Completing,
        State::Completed,
    ];

    /// Numeric code published through `StateCur`.
    pub const fn code(self) -> i64 {
        match self {
            State::Stopped => 4,
            State::Starting => 8,
            State::Idle => 16,
            State::Paused => 32,
            State::Execute => 64,
            State::Stopping => 128,
            State::Aborting => 256,
            State::Aborted => 512,
            State::Holding => 1024,
            State::Held => 2048,
            State::Unholding => 4096,
            State::Pausing => 8192,
            State::Resuming => 16384,
            State::Resetting => 32768,
            State::Completing => 65536,
            State::Completed => 131072,
        }
    }

    pub fn from_code(code: i64) -> Option<State> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Starting => "starting",
            State::Idle => "idle",
            State::Paused => "paused",
            State::Execute => "execute",
            State::Stopping => "stopping",
            State::Aborting => "aborting",
            State::Aborted => "aborted",
            State::Holding => "holding",
            State::Held => "held",
            State::Unholding => "unholding",
            State::Pausing => "pausing",
            State::Resuming => "resuming",
            State::Resetting => "resetting",
            State::Completing => "completing",
            State::Completed => "completed",
        }
    }

    pub fn from_name(name: &str) -> Option<State> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Transitional ("-ing") states: a worker is moving the service along and
    /// no command is accepted.
    pub const fn is_transitional(self) -> bool {
        matches!(
            self,
            State::Starting
                | State::Stopping
                | State::Aborting
                | State::Holding
                | State::Unholding
                | State::Pausing
                | State::Resuming
                | State::Resetting
                | State::Completing
        )
    }

    /// Successor reached by auto-advance, if any.
    ///
    /// `execute → completing` is only taken for self-completing procedures;
    /// the state machine decides that, not this table.
    pub const fn successor(self) -> Option<State> {
        match self {
            State::Starting => Some(State::Execute),
            State::Execute => Some(State::Completing),
            State::Completing => Some(State::Completed),
            State::Pausing => Some(State::Paused),
            State::Resuming => Some(State::Execute),
            State::Holding => Some(State::Held),
            State::Unholding => Some(State::Execute),
            State::Stopping => Some(State::Stopped),
            State::Aborting => Some(State::Aborted),
            State::Resetting => Some(State::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for State {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::from_name(s).ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// Name that is neither a known command nor a known state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown code name '{0}'")]
pub struct UnknownCode(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lookup_both_ways() {
        for c in Command::ALL {
            assert_eq!(Command::from_code(c.code()), Some(c));
            assert_eq!(c.name().parse::<Command>(), Ok(c));
        }
        assert_eq!(Command::from_code(0), None);
        assert_eq!(Command::from_code(3), None);
    }

    #[test]
    fn test_state_lookup_both_ways() {
        for s in State::ALL {
            assert_eq!(State::from_code(s.code()), Some(s));
            assert_eq!(State::from_name(s.name()), Some(s));
        }
        assert_eq!(State::Idle.code(), 16);
        assert!("running".parse::<State>().is_err());
    }

    #[test]
    fn test_command_codes_are_distinct_bits() {
        let mut mask = 0i64;
        for c in Command::ALL {
            assert_eq!(c.code().count_ones(), 1);
            assert_eq!(mask & c.code(), 0);
            mask |= c.code();
        }
    }

    #[test]
    fn test_every_transitional_state_has_a_successor() {
        for s in State::ALL {
            if s.is_transitional() {
                assert!(s.successor().is_some(), "{s} has no successor");
            }
        }
        assert_eq!(State::Idle.successor(), None);
        assert_eq!(State::Unholding.successor(), Some(State::Execute));
    }
}
