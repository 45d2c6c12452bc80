//! Named actions and the table that dispatches them.
//!
//! Every action identifier maps to exactly one handler. How the action's
//! `value` reaches the handler depends on the entry's [`ParamKind`]:
//! triggers ignore it, absolute handlers receive the raw controller value,
//! and relative handlers receive the difference to the previous raw value
//! seen for the same controller.

mod handlers;
mod tempo;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, warn};

use crate::editor::Editor;
use crate::{Error, Result};

pub use tempo::{BeatCounter, TapTempo};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Action {
    pub identifier: String,
    pub parameter1: String,
    pub parameter2: String,
    pub parameter3: String,
    pub value: String,
}

impl Action {
    pub fn new<S: Into<String>>(identifier: S) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter1<S: ToString>(mut self, parameter: S) -> Self {
        self.parameter1 = parameter.to_string();
        self
    }

    pub fn with_parameter2<S: ToString>(mut self, parameter: S) -> Self {
        self.parameter2 = parameter.to_string();
        self
    }

    pub fn with_parameter3<S: ToString>(mut self, parameter: S) -> Self {
        self.parameter3 = parameter.to_string();
        self
    }

    pub fn with_value<S: ToString>(mut self, value: S) -> Self {
        self.value = value.to_string();
        self
    }

    fn parse<T: FromStr>(&self, field: &'static str, text: &str) -> Result<T> {
        text.trim().parse().map_err(|_| Error::InvalidParameter {
            action: self.identifier.clone(),
            field,
            value: text.to_string(),
        })
    }

    /// The value field as a number. Controllers send integers, but
    /// fractional values are accepted.
    pub fn value_f64(&self) -> Result<f64> {
        self.parse("value", &self.value)
    }

    /// The value field as a zero-based index.
    pub fn value_index(&self) -> Result<usize> {
        let value = self.value_f64()?;
        if value < 0.0 {
            return Err(Error::InvalidParameter {
                action: self.identifier.clone(),
                field: "value",
                value: self.value.clone(),
            });
        }
        Ok(value as usize)
    }

    pub fn index1(&self) -> Result<usize> {
        self.parse("parameter1", &self.parameter1)
    }

    pub fn index2(&self) -> Result<usize> {
        self.parse("parameter2", &self.parameter2)
    }

    pub fn offset1(&self) -> Result<i64> {
        self.parse("parameter1", &self.parameter1)
    }

    /// Scale factor in parameter1, 1 when left empty.
    pub fn multiplier(&self) -> Result<f64> {
        if self.parameter1.trim().is_empty() {
            Ok(1.0)
        } else {
            self.parse("parameter1", &self.parameter1)
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {}) = {}",
            self.identifier, self.parameter1, self.parameter2, self.parameter3, self.value
        )
    }
}

/// The physical control a relative value is tracked for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControllerClass {
    Tempo,
    FineTempo,
    MasterVolume,
    StripVolume(usize),
    StripPan(usize),
    EffectLevel { strip: usize, slot: usize },
}

/// Resolves the controller class of a relative action. It also resolves
/// whatever the handler will address, so a bad target fails before the
/// controller memory is touched.
pub type ClassOf = fn(&Context<'_>, &Action) -> Result<ControllerClass>;

#[derive(Copy, Clone)]
pub enum ParamKind {
    Trigger,
    Absolute,
    /// Tracks consecutive raw values per controller class.
    Relative(ClassOf),
}

impl ParamKind {
    pub fn is_relative(&self) -> bool {
        matches!(self, ParamKind::Relative(_))
    }
}

impl fmt::Debug for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamKind::Trigger => f.write_str("Trigger"),
            ParamKind::Absolute => f.write_str("Absolute"),
            ParamKind::Relative(_) => f.write_str("Relative"),
        }
    }
}

/// Last raw value seen for each relative controller.
#[derive(Debug, Default)]
pub struct ControllerMemory {
    last: HashMap<ControllerClass, f64>,
}

impl ControllerMemory {
    /// Change from the previous value of `class`, or `None` before the
    /// first value has been recorded.
    pub fn delta(&self, class: ControllerClass, raw: f64) -> Option<f64> {
        self.last(class).map(|last| raw - last)
    }

    pub fn record(&mut self, class: ControllerClass, raw: f64) {
        self.last.insert(class, raw);
    }

    pub fn last(&self, class: ControllerClass) -> Option<f64> {
        self.last.get(&class).copied()
    }

    pub fn forget(&mut self, class: ControllerClass) {
        self.last.remove(&class);
    }
}

/// Everything a handler may touch.
pub struct Context<'a> {
    pub editor: &'a Editor,
    pub tap_tempo: &'a mut TapTempo,
    pub beat_counter: &'a mut BeatCounter,
    pub now: Instant,
}

/// A handler receives the raw value for absolute entries, the delta for
/// relative entries and 0 for triggers.
pub type Handler = Box<dyn Fn(&mut Context<'_>, &Action, f64) -> Result<()> + Send + Sync>;

pub struct ActionEntry {
    pub kind: ParamKind,
    handler: Handler,
}

impl fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ActionEntry")
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ActionTable {
    entries: HashMap<String, ActionEntry>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with every built-in action registered.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        handlers::register(&mut table);
        table
    }

    /// Registers `handler` under `identifier`, replacing any previous entry.
    pub fn register<F>(&mut self, identifier: &str, kind: ParamKind, handler: F)
    where
        F: Fn(&mut Context<'_>, &Action, f64) -> Result<()> + Send + Sync + 'static,
    {
        let entry = ActionEntry {
            kind,
            handler: Box::new(handler),
        };
        if self.entries.insert(identifier.to_string(), entry).is_some() {
            warn!("action {} registered twice", identifier);
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&ActionEntry> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered identifiers in sorted order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
}

/// Resolves actions against a table and runs their handlers.
pub struct ActionManager {
    table: ActionTable,
    memory: ControllerMemory,
    tap_tempo: TapTempo,
    beat_counter: BeatCounter,
    editor: Editor,
    state: DispatchState,
}

impl ActionManager {
    pub fn new(editor: Editor) -> Self {
        Self::with_table(editor, ActionTable::builtin())
    }

    pub fn with_table(editor: Editor, table: ActionTable) -> Self {
        let beats = editor.config().beat_counter_beats;
        Self {
            table,
            memory: ControllerMemory::default(),
            tap_tempo: TapTempo::new(),
            beat_counter: BeatCounter::new(beats),
            editor,
            state: DispatchState::Idle,
        }
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }

    pub fn memory(&self) -> &ControllerMemory {
        &self.memory
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn handle_action(&mut self, action: &Action) -> Result<()> {
        self.handle_action_at(action, Instant::now())
    }

    /// Dispatches `action` as if it arrived at `now`.
    pub fn handle_action_at(&mut self, action: &Action, now: Instant) -> Result<()> {
        let entry = match self.table.get(&action.identifier) {
            Some(entry) => entry,
            None => {
                warn!("unknown action {}", action.identifier);
                return Err(Error::UnknownAction(action.identifier.clone()));
            }
        };
        debug!("dispatching {}", action);

        self.state = DispatchState::Dispatching;
        let mut ctx = Context {
            editor: &self.editor,
            tap_tempo: &mut self.tap_tempo,
            beat_counter: &mut self.beat_counter,
            now,
        };
        let result = dispatch(entry, &mut self.memory, &mut ctx, action);
        self.state = DispatchState::Idle;

        if let Err(e) = &result {
            debug!("{} failed: {}", action.identifier, e);
        }
        result
    }
}

fn dispatch(
    entry: &ActionEntry,
    memory: &mut ControllerMemory,
    ctx: &mut Context<'_>,
    action: &Action,
) -> Result<()> {
    match entry.kind {
        ParamKind::Trigger => (entry.handler)(ctx, action, 0.0),
        ParamKind::Absolute => {
            let value = action.value_f64()?;
            (entry.handler)(ctx, action, value)
        }
        ParamKind::Relative(class_of) => {
            let class = class_of(ctx, action)?;
            let raw = action.value_f64()?;
            // the first value only seeds the memory
            if let Some(delta) = memory.delta(class, raw) {
                (entry.handler)(ctx, action, delta)?;
            }
            memory.record(class, raw);
            Ok(())
        }
    }
}
