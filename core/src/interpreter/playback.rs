//! Playback engine
//!
//! Drives a compiled [`Program`] forward and reports each step to two
//! injected callbacks:
//! - `emit(command)`: the game/view layer
//! - `highlight(id | None)`: the block editor's "current instruction" marker
//!
//! ## States
//!
//! ```text
//! Idle --play--> Running --play--> Running (no-op)
//! Running --program exhausted--> Idle
//! Running --stop--> Idle,  Idle --stop--> Idle (cursor reset, reset emitted)
//! ```
//!
//! Everything runs on one thread. Timer ticks come from a [`Scheduler`] on the
//! same thread as the control calls, so shared state lives in `RefCell`s that
//! are never borrowed across a callback.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

use super::scheduler::{RepeatingTask, Scheduler, Tick, TokioScheduler};
use crate::types::{Command, Instruction, InstructionId, Program, Speed};

/// Tick period at speed 1
pub const DEFAULT_BASE_PERIOD: Duration = Duration::from_millis(700);

pub type EmitFn = Box<dyn Fn(&Command)>;
pub type HighlightFn = Box<dyn Fn(Option<&InstructionId>)>;

/* ===================== State ===================== */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// No timer active
    #[default]
    Idle,
    /// A playback timer is active
    Running,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub program: Program,
    /// Index of the next instruction; `program.len()` means exhausted
    pub cursor: usize,
    pub mode: Mode,
    pub speed: Speed,
}

impl PlaybackState {
    fn new(program: Program, speed: Speed) -> Self {
        Self {
            program,
            cursor: 0,
            mode: Mode::Idle,
            speed,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.program.len()
    }
}

/// Result of a manual [`PlaybackEngine::step`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction was emitted and highlighted
    Emitted(Instruction),
    /// Nothing left to run; the highlight was cleared
    Exhausted,
    /// Playback is running, so the manual step was not taken
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub base_period: Duration,
    pub speed: Speed,
    /// Restart a running timer when the speed changes, instead of waiting
    /// for the next `play()`
    pub reschedule_on_speed_change: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            base_period: DEFAULT_BASE_PERIOD,
            speed: Speed::NORMAL,
            reschedule_on_speed_change: false,
        }
    }
}

/* ===================== Engine ===================== */

struct Inner {
    state: RefCell<PlaybackState>,
    timer: RefCell<Option<Box<dyn RepeatingTask>>>,
    /// Bumped whenever a timer starts or is cancelled; ticks from an older
    /// run see a different epoch and end themselves
    epoch: Cell<u64>,
    emit: EmitFn,
    highlight: HighlightFn,
    scheduler: Box<dyn Scheduler>,
    base_period: Duration,
    reschedule_on_speed_change: bool,
}

/// Handle to a playback engine. Clones share the same engine.
///
/// Dropping the last handle cancels any active timer.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Rc<Inner>,
}

impl PlaybackEngine {
    /// Engine with default options, ticking on [`TokioScheduler`]
    pub fn new(
        emit: impl Fn(&Command) + 'static,
        highlight: impl Fn(Option<&InstructionId>) + 'static,
    ) -> Self {
        Self::builder().emit(emit).highlight(highlight).build()
    }

    pub fn builder() -> PlaybackEngineBuilder {
        PlaybackEngineBuilder::new()
    }

    /* ---------- control surface ---------- */

    /// Start continuous playback.
    ///
    /// No-op while running. On an exhausted (or empty) program the highlight
    /// is cleared right away and no timer is started.
    pub fn play(&self) {
        if self.is_running() {
            trace!("play() while running, ignoring");
            return;
        }
        if self.inner.state.borrow().is_exhausted() {
            debug!("play() on an exhausted program");
            (self.inner.highlight)(None);
            return;
        }
        start_timer(&self.inner);
    }

    /// Run the instruction at the cursor, or clear the highlight when there
    /// is none. Ignored while running.
    pub fn step(&self) -> StepOutcome {
        if self.is_running() {
            debug!("step() while running, ignoring");
            return StepOutcome::Ignored;
        }
        self.inner.advance()
    }

    /// Cancel playback, rewind to the first instruction and emit `reset`.
    ///
    /// Safe in any state, including from inside a callback. Nothing of the
    /// stopped run is emitted or highlighted after this returns. The
    /// highlight is left alone.
    pub fn stop(&self) {
        let was_running = self.inner.cancel_timer();
        self.inner.state.borrow_mut().cursor = 0;
        debug!(was_running, "Playback stopped");
        (self.inner.emit)(&Command::Reset);
    }

    /// Change the playback rate.
    ///
    /// Takes effect at the next `play()`, or immediately for a running timer
    /// when `reschedule_on_speed_change` is set.
    pub fn set_speed(&self, speed: Speed) {
        let previous = std::mem::replace(&mut self.inner.state.borrow_mut().speed, speed);
        debug!(%previous, %speed, "Playback speed changed");

        if previous != speed && self.inner.reschedule_on_speed_change && self.is_running() {
            self.inner.cancel_timer();
            start_timer(&self.inner);
        }
    }

    /// Replace the program.
    ///
    /// A running playback is stopped first. The cursor is kept, clamped to
    /// the new program's length.
    pub fn load(&self, program: Program) {
        if self.is_running() {
            debug!("Program replaced during playback, stopping first");
            self.stop();
        }

        let mut state = self.inner.state.borrow_mut();
        let len = program.len();
        state.program = program;
        state.cursor = state.cursor.min(len);
        debug!(
            instructions = state.program.len(),
            cursor = state.cursor,
            "Program loaded"
        );
    }

    /* ---------- inspection ---------- */

    pub fn mode(&self) -> Mode {
        self.inner.state.borrow().mode
    }

    pub fn is_running(&self) -> bool {
        self.mode() == Mode::Running
    }

    pub fn cursor(&self) -> usize {
        self.inner.state.borrow().cursor
    }

    pub fn speed(&self) -> Speed {
        self.inner.state.borrow().speed
    }

    pub fn program(&self) -> Program {
        self.inner.state.borrow().program.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.borrow().clone()
    }

    /// Tick period at the current speed
    pub fn period(&self) -> Duration {
        self.inner.period()
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &*self.inner.state.borrow())
            .field("base_period", &self.inner.base_period)
            .finish()
    }
}

impl Inner {
    fn period(&self) -> Duration {
        self.state.borrow().speed.scale(self.base_period)
    }

    /// Emit the instruction at the cursor and move past it
    fn advance(&self) -> StepOutcome {
        let next = {
            let mut state = self.state.borrow_mut();
            let instruction = state.program.get(state.cursor).cloned();
            if instruction.is_some() {
                state.cursor += 1;
            }
            instruction
        };

        match next {
            Some(instruction) => {
                let epoch = self.epoch.get();
                (self.emit)(&instruction.command);
                // The emit consumer may have stopped or restarted playback
                if self.epoch.get() == epoch {
                    (self.highlight)(Some(&instruction.id));
                }
                StepOutcome::Emitted(instruction)
            }
            None => {
                (self.highlight)(None);
                StepOutcome::Exhausted
            }
        }
    }

    fn on_tick(&self, epoch: u64) -> ControlFlow<()> {
        if self.epoch.get() != epoch {
            return ControlFlow::Break(());
        }

        match self.advance() {
            StepOutcome::Emitted(instruction) => {
                trace!(id = %instruction.id, command = %instruction.command, "Tick");
                ControlFlow::Continue(())
            }
            StepOutcome::Exhausted | StepOutcome::Ignored => {
                // A callback may already have stopped or restarted playback
                if self.epoch.get() == epoch {
                    self.cancel_timer();
                    debug!("Program finished");
                }
                ControlFlow::Break(())
            }
        }
    }

    /// Cancel the active timer, if any. Returns whether one was active.
    fn cancel_timer(&self) -> bool {
        self.epoch.set(self.epoch.get() + 1);
        self.state.borrow_mut().mode = Mode::Idle;

        let task = self.timer.borrow_mut().take();
        match task {
            Some(mut task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }
}

fn start_timer(inner: &Rc<Inner>) {
    let period = inner.period();
    let epoch = inner.epoch.get() + 1;
    inner.epoch.set(epoch);

    let weak = Rc::downgrade(inner);
    let tick: Tick = Box::new(move || match weak.upgrade() {
        Some(inner) => inner.on_tick(epoch),
        None => ControlFlow::Break(()),
    });

    let task = inner.scheduler.schedule_repeating(period, tick);
    *inner.timer.borrow_mut() = Some(task);
    inner.state.borrow_mut().mode = Mode::Running;

    debug!(?period, epoch, "Playback started");
}

/* ===================== Builder ===================== */

/// Builder for [`PlaybackEngine`]
///
/// Callbacks that are not set default to no-ops.
pub struct PlaybackEngineBuilder {
    emit: Option<EmitFn>,
    highlight: Option<HighlightFn>,
    scheduler: Option<Box<dyn Scheduler>>,
    options: PlaybackOptions,
    program: Program,
}

impl PlaybackEngineBuilder {
    pub fn new() -> Self {
        Self {
            emit: None,
            highlight: None,
            scheduler: None,
            options: PlaybackOptions::default(),
            program: Program::empty(),
        }
    }

    pub fn emit(mut self, emit: impl Fn(&Command) + 'static) -> Self {
        self.emit = Some(Box::new(emit));
        self
    }

    pub fn highlight(mut self, highlight: impl Fn(Option<&InstructionId>) + 'static) -> Self {
        self.highlight = Some(Box::new(highlight));
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn speed(mut self, speed: Speed) -> Self {
        self.options.speed = speed;
        self
    }

    pub fn base_period(mut self, base_period: Duration) -> Self {
        self.options.base_period = base_period;
        self
    }

    pub fn reschedule_on_speed_change(mut self, reschedule: bool) -> Self {
        self.options.reschedule_on_speed_change = reschedule;
        self
    }

    /// Initial program (empty by default)
    pub fn program(mut self, program: Program) -> Self {
        self.program = program;
        self
    }

    pub fn build(self) -> PlaybackEngine {
        let inner = Inner {
            state: RefCell::new(PlaybackState::new(self.program, self.options.speed)),
            timer: RefCell::new(None),
            epoch: Cell::new(0),
            emit: self.emit.unwrap_or_else(|| Box::new(|_: &Command| {})),
            highlight: self
                .highlight
                .unwrap_or_else(|| Box::new(|_: Option<&InstructionId>| {})),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Box::new(TokioScheduler)),
            base_period: self.options.base_period,
            reschedule_on_speed_change: self.options.reschedule_on_speed_change,
        };

        PlaybackEngine {
            inner: Rc::new(inner),
        }
    }
}

impl Default for PlaybackEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
