//! # Command-enable control.
//!
//! Keeps the set of commands a service accepts in its current lifecycle
//! state. The set is recomputed from a static per-state table on every
//! transition and narrowed by the optional control loops.
//!
//! ```text
//! state       enabled                                     [loop-gated]
//! idle        start stop abort
//! execute     complete stop abort                         [pause] [hold] [restart]
//! paused      stop abort                                  [resume] [hold]
//! held        stop abort                                  [unhold]
//! completed   reset stop abort
//! stopped     reset abort
//! aborted     reset
//! *ing        (nothing)
//! ```
//!
//! Toggling a loop recomputes the set for the last executed state. After
//! [`CommandEnControl::disable_all`] nothing is re-enabled until the next
//! `execute`/`set_default`.

use parking_lot::Mutex;

use super::codes::{Command, State};

#[derive(Debug, Clone, Copy)]
struct Inner {
    mask: i64,
    last: State,
    disabled: bool,
    pause_loop: bool,
    hold_loop: bool,
    restart: bool,
}

/// Per-service permission bitmask (`CommandEn`).
#[derive(Debug)]
pub struct CommandEnControl {
    inner: Mutex<Inner>,
}

impl Default for CommandEnControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEnControl {
    /// Starts with the idle table and every optional loop disabled.
    pub fn new() -> Self {
        let mut inner = Inner {
            mask: 0,
            last: State::Idle,
            disabled: false,
            pause_loop: false,
            hold_loop: false,
            restart: false,
        };
        inner.mask = table(&inner, State::Idle);
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn is_enabled(&self, cmd: Command) -> bool {
        self.inner.lock().mask & cmd.code() != 0
    }

    /// Recomputes the enabled set for `state`.
    pub fn execute(&self, state: State) {
        let mut g = self.inner.lock();
        g.last = state;
        g.disabled = false;
        g.mask = table(&g, state);
    }

    pub fn disable_all(&self) {
        let mut g = self.inner.lock();
        g.disabled = true;
        g.mask = 0;
    }

    /// Restores the idle table.
    pub fn set_default(&self) {
        self.execute(State::Idle);
    }

    pub fn enable_pause_loop(&self, enabled: bool) {
        self.toggle(|g| g.pause_loop = enabled);
    }

    pub fn enable_hold_loop(&self, enabled: bool) {
        self.toggle(|g| g.hold_loop = enabled);
    }

    pub fn enable_restart(&self, enabled: bool) {
        self.toggle(|g| g.restart = enabled);
    }

    /// Current bitmask, as published through `CommandEn`.
    pub fn command_en(&self) -> i64 {
        self.inner.lock().mask
    }

    /// Enabled commands in code order.
    pub fn enabled(&self) -> Vec<Command> {
        let mask = self.command_en();
        Command::ALL
            .into_iter()
            .filter(|c| mask & c.code() != 0)
            .collect()
    }

    fn toggle(&self, f: impl FnOnce(&mut Inner)) {
        let mut g = self.inner.lock();
        f(&mut g);
        if !g.disabled {
            let last = g.last;
            g.mask = table(&g, last);
        }
    }
}

fn table(cfg: &Inner, state: State) -> i64 {
    use Command::*;

    let mut cmds: Vec<Command> = match state {
        State::Idle => vec![Start, Stop, Abort],
        State::Execute => vec![Complete, Stop, Abort],
        State::Paused => vec![Stop, Abort],
        State::Held => vec![Stop, Abort],
        State::Completed => vec![Reset, Stop, Abort],
        State::Stopped => vec![Reset, Abort],
        State::Aborted => vec![Reset],
        _ => Vec::new(),
    };

    match state {
        State::Execute => {
            if cfg.pause_loop {
                cmds.push(Pause);
            }
            if cfg.hold_loop {
                cmds.push(Hold);
            }
            if cfg.restart {
                cmds.push(Restart);
            }
        }
        State::Paused => {
            if cfg.pause_loop {
                cmds.push(Resume);
            }
            if cfg.hold_loop {
                cmds.push(Hold);
            }
        }
        State::Held if cfg.hold_loop => cmds.push(Unhold),
        _ => {}
    }

    cmds.into_iter().fold(0, |mask, c| mask | c.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(cmds: &[Command]) -> i64 {
        cmds.iter().fold(0, |m, c| m | c.code())
    }

    #[test]
    fn test_idle_is_default() {
        let ctl = CommandEnControl::new();
        assert_eq!(
            ctl.enabled(),
            vec![Command::Start, Command::Stop, Command::Abort]
        );
    }

    #[test]
    fn test_table_without_loops() {
        use Command::*;
        let ctl = CommandEnControl::new();
        let expected = [
            (State::Execute, mask(&[Complete, Stop, Abort])),
            (State::Paused, mask(&[Stop, Abort])),
            (State::Held, mask(&[Stop, Abort])),
            (State::Completed, mask(&[Reset, Stop, Abort])),
            (State::Stopped, mask(&[Reset, Abort])),
            (State::Aborted, mask(&[Reset])),
        ];
        for (state, m) in expected {
            ctl.execute(state);
            assert_eq!(ctl.command_en(), m, "state {state}");
        }
        for state in State::ALL.into_iter().filter(|s| s.is_transitional()) {
            ctl.execute(state);
            assert_eq!(ctl.command_en(), 0, "state {state}");
        }
    }

    #[test]
    fn test_loops_extend_execute_paused_held() {
        use Command::*;
        let ctl = CommandEnControl::new();
        ctl.enable_pause_loop(true);
        ctl.enable_hold_loop(true);
        ctl.enable_restart(true);

        ctl.execute(State::Execute);
        assert_eq!(
            ctl.command_en(),
            mask(&[Complete, Stop, Abort, Pause, Hold, Restart])
        );
        ctl.execute(State::Paused);
        assert_eq!(ctl.command_en(), mask(&[Stop, Abort, Resume, Hold]));
        ctl.execute(State::Held);
        assert_eq!(ctl.command_en(), mask(&[Stop, Abort, Unhold]));
        ctl.execute(State::Idle);
        assert_eq!(ctl.command_en(), mask(&[Start, Stop, Abort]));
    }

    #[test]
    fn test_toggle_recomputes_last_state() {
        let ctl = CommandEnControl::new();
        ctl.execute(State::Execute);
        assert!(!ctl.is_enabled(Command::Pause));
        ctl.enable_pause_loop(true);
        assert!(ctl.is_enabled(Command::Pause));
        ctl.enable_pause_loop(false);
        assert!(!ctl.is_enabled(Command::Pause));
    }

    #[test]
    fn test_toggle_does_not_undo_disable_all() {
        let ctl = CommandEnControl::new();
        ctl.execute(State::Execute);
        ctl.disable_all();
        ctl.enable_hold_loop(true);
        assert_eq!(ctl.command_en(), 0);
        ctl.set_default();
        assert!(ctl.is_enabled(Command::Start));
    }
}
