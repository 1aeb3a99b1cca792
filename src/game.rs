use std::rc::{Rc, Weak};

use log::{debug, info, trace, warn};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::grid::{Cell, Grid};
use crate::piece::{PieceSource, Position, RandomPieceSource, Shape, TetrominoKind};

// ============================================================================
// Configuration
// ============================================================================

pub const SCORE_PER_LOCK: u32 = 10;
pub const SCORE_PER_LEVEL: u32 = 100;

// Level is the tick interval in milliseconds: lower is faster.
pub const BASE_LEVEL: u32 = 1000;
pub const MIN_LEVEL: u32 = 100;
pub const LEVEL_STEP: u32 = 100;
const MAX_TIER: u32 = BASE_LEVEL / SCORE_PER_LEVEL;

// ============================================================================
// Types
// ============================================================================

/// Observer of a [`GameState`]. Callbacks get shared access only; listeners
/// keep their own state behind interior mutability.
pub trait GameListener {
    fn on_change(&self, game: &GameState);
    fn on_game_over(&self, game: &GameState);
}

/// Whether the next scheduler tick should be swallowed.
///
/// A scheduler that (re)starts fires immediately; arming the gate keeps that
/// first tick from dropping the piece a row early.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickGate {
    AwaitingFirstTick,
    Running,
}

struct ListenerSlot {
    listener: Weak<dyn GameListener>,
    saw_game_over: bool,
}

pub struct GameState {
    grid: Grid,
    max_colors: u8,
    shape: Shape,
    position: Position,
    score: u32,
    level: u32,
    max_level: u32,
    tick_gate: TickGate,
    paused: bool,
    finished: bool,
    source: Box<dyn PieceSource>,
    listeners: Vec<ListenerSlot>,
}

// ============================================================================
// Construction
// ============================================================================

impl GameState {
    pub fn new(width: usize, height: usize, max_colors: u8) -> Result<Self, GameError> {
        Self::with_source(
            GameConfig::new(width, height, max_colors)?,
            Box::new(RandomPieceSource::new()),
        )
    }

    pub fn with_source(
        config: GameConfig,
        source: Box<dyn PieceSource>,
    ) -> Result<Self, GameError> {
        config.validate()?;
        Ok(Self::assemble(
            Grid::new(config.width, config.height),
            config.max_colors,
            source,
        ))
    }

    /// Starts a game on a prepared grid, kept exactly as given until the
    /// first lock.
    pub fn with_grid(
        grid: Grid,
        max_colors: u8,
        source: Box<dyn PieceSource>,
    ) -> Result<Self, GameError> {
        GameConfig {
            width: grid.width(),
            height: grid.height(),
            max_colors,
        }
        .validate()?;
        if let Some(&value) = grid.rows().flatten().find(|&&v| v >= max_colors) {
            return Err(GameError::ColorOutOfRange { value, max_colors });
        }
        Ok(Self::assemble(grid, max_colors, source))
    }

    fn assemble(grid: Grid, max_colors: u8, source: Box<dyn PieceSource>) -> Self {
        let mut game = Self {
            grid,
            max_colors,
            shape: Shape::default(),
            position: Position::default(),
            score: 0,
            level: BASE_LEVEL,
            max_level: BASE_LEVEL,
            tick_gate: TickGate::AwaitingFirstTick,
            paused: false,
            finished: false,
            source,
            listeners: Vec::new(),
        };
        game.spawn();
        if !game.is_position_valid(game.position) {
            info!("no room for the first piece on a {:?} grid", game.size());
            game.finished = true;
        }
        game
    }
}

// ============================================================================
// Queries
// ============================================================================

impl GameState {
    pub fn size(&self) -> (usize, usize) {
        (self.grid.width(), self.grid.height())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn max_colors(&self) -> u8 {
        self.max_colors
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn tick_gate(&self) -> TickGate {
        self.tick_gate
    }

    pub fn tick_duration_ms(&self) -> u64 {
        u64::from(self.level.max(1))
    }

    pub fn spawn_anchor(&self) -> Position {
        Position::new(self.grid.width() as i32 / 2 - 2, 0)
    }

    /// True iff every occupied cell of the current shape, anchored at
    /// `candidate`, lands inside the grid on an empty cell.
    pub fn is_position_valid(&self, candidate: Position) -> bool {
        self.shape.occupied().all(|(col, row, _)| {
            self.grid
                .is_free(candidate.x + col as i32, candidate.y + row as i32)
        })
    }

    pub fn render_grid(&self) -> Grid {
        let mut visual = self.grid.clone();
        for (col, row, value) in self.shape.occupied() {
            let x = self.position.x + col as i32;
            let y = self.position.y + row as i32;
            if x >= 0 && y >= 0 {
                visual.set(y as usize, x as usize, value);
            }
        }
        visual
    }
}

// ============================================================================
// Commands
// ============================================================================

impl GameState {
    fn is_frozen(&self) -> bool {
        self.paused || self.finished
    }

    pub fn move_left(&mut self) -> bool {
        self.shift(-1)
    }

    pub fn move_right(&mut self) -> bool {
        self.shift(1)
    }

    fn shift(&mut self, dx: i32) -> bool {
        if self.is_frozen() {
            return false;
        }
        let candidate = self.position.offset(dx, 0);
        if !self.is_position_valid(candidate) {
            trace!("shift by {} blocked at {:?}", dx, self.position);
            return false;
        }
        self.position = candidate;
        self.notify_change();
        true
    }

    /// Moves the piece down one row, or locks it when it cannot move.
    /// Returns `true` only if the piece moved.
    pub fn slide_down(&mut self) -> bool {
        if self.is_frozen() {
            return false;
        }
        let candidate = self.position.offset(0, 1);
        if self.is_position_valid(candidate) {
            self.position = candidate;
            self.notify_change();
            true
        } else {
            self.lock();
            false
        }
    }

    /// Sinks the piece as far as it goes without locking it; the next
    /// `slide_down` or tick does that. Returns the number of rows fallen.
    pub fn hard_drop(&mut self) -> u32 {
        if self.is_frozen() {
            return 0;
        }
        let mut fallen = 0;
        while self.is_position_valid(self.position.offset(0, 1)) {
            self.position = self.position.offset(0, 1);
            fallen += 1;
        }
        fallen
    }

    /// Rotates clockwise in place, keeping the old shape if the new one does
    /// not fit. Listeners are notified either way.
    pub fn rotate(&mut self) -> bool {
        if self.is_frozen() {
            return false;
        }
        let previous = self.shape;
        self.shape = previous.rotated();
        let kept = self.is_position_valid(self.position);
        if !kept {
            trace!("rotation blocked at {:?}", self.position);
            self.shape = previous;
        }
        self.notify_change();
        kept
    }

    pub fn level_up(&mut self) {
        if self.is_frozen() {
            return;
        }
        self.level = self.level.saturating_sub(LEVEL_STEP).max(MIN_LEVEL);
        self.notify_change();
    }

    pub fn level_down(&mut self) {
        if self.is_frozen() {
            return;
        }
        self.level = (self.level + LEVEL_STEP).min(self.max_level);
        self.notify_change();
    }

    pub fn pause(&mut self) {
        self.paused = !self.paused;
        debug!("paused: {}", self.paused);
    }

    pub fn reset(&mut self) {
        self.grid.clear();
        self.score = 0;
        self.level = BASE_LEVEL;
        self.max_level = BASE_LEVEL;
        self.finished = false;
        self.tick_gate = TickGate::AwaitingFirstTick;
        for slot in &mut self.listeners {
            slot.saw_game_over = false;
        }
        info!("new game on a {:?} grid", self.size());

        self.spawn();
        self.notify_change();
        if !self.is_position_valid(self.position) {
            self.finish();
        }
    }

    pub fn place_piece(&mut self, shape: Shape, position: Position) -> bool {
        let shape = self.sanitize(shape);
        let previous = std::mem::replace(&mut self.shape, shape);
        if !self.is_position_valid(position) {
            self.shape = previous;
            return false;
        }
        self.position = position;
        self.notify_change();
        true
    }
}

// ============================================================================
// Tick
// ============================================================================

impl GameState {
    pub fn step(&mut self) {
        if self.paused {
            return;
        }
        if self.tick_gate == TickGate::AwaitingFirstTick {
            self.tick_gate = TickGate::Running;
            return;
        }
        if self.finished {
            self.signal_game_over();
        } else {
            self.slide_down();
        }
    }

    /// Swallow the next tick. Call whenever the scheduler restarts.
    pub fn arm_first_tick(&mut self) {
        self.tick_gate = TickGate::AwaitingFirstTick;
    }
}

// ============================================================================
// Lock Sequence
// ============================================================================

impl GameState {
    fn lock(&mut self) {
        self.paste();
        self.settle_rows();
        self.spawn();
        self.notify_change();

        if !self.is_position_valid(self.position) {
            self.finish();
        }

        self.add_score(SCORE_PER_LOCK);
        self.advance_level_curve();
    }

    fn paste(&mut self) {
        for (col, row, value) in self.shape.occupied() {
            let x = self.position.x + col as i32;
            let y = self.position.y + row as i32;
            if x >= 0 && y >= 0 {
                self.grid.set(y as usize, x as usize, value);
            }
        }
        debug!("locked piece at {:?}", self.position);
    }

    fn settle_rows(&mut self) {
        let cleared = self.grid.clear_full_rows();
        self.grid.compact_down();
        if cleared > 0 {
            debug!("cleared {} row(s)", cleared);
        }
    }

    fn spawn(&mut self) {
        let shape = self.source.next_shape(self.max_colors);
        self.shape = self.sanitize(shape);
        self.position = self.spawn_anchor();
    }

    /// Folds out-of-palette colors back into range and replaces empty shapes,
    /// so any source keeps the grid within `[0, max_colors)`.
    fn sanitize(&self, shape: Shape) -> Shape {
        let max_colors = self.max_colors;
        if shape.is_empty() {
            warn!("piece source produced an empty shape, substituting O");
            return TetrominoKind::O.shape(TetrominoKind::O.color(max_colors));
        }
        if shape.occupied().any(|(_, _, value)| value >= max_colors) {
            warn!("piece color outside a palette of {} colors", max_colors);
            return shape.map_colors(|value| fold_color(value, max_colors));
        }
        shape
    }

    fn add_score(&mut self, total: u32) {
        self.score = self.score.saturating_add(total);
        self.notify_change();
    }

    fn advance_level_curve(&mut self) {
        if self.score % SCORE_PER_LEVEL != 0 {
            return;
        }
        let tier = self.score / SCORE_PER_LEVEL;
        if tier < MAX_TIER {
            let ceiling = BASE_LEVEL - tier * SCORE_PER_LEVEL;
            self.level = self.level.min(ceiling);
            self.max_level = ceiling;
            debug!("score {} reached tier {}, level {}", self.score, tier, self.level);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        info!("game over with score {}", self.score);
        self.signal_game_over();
    }
}

fn fold_color(value: Cell, max_colors: u8) -> Cell {
    if value < max_colors {
        value
    } else {
        (value - 1) % (max_colors - 1) + 1
    }
}

// ============================================================================
// Listeners
// ============================================================================

impl GameState {
    /// Registers a listener without taking ownership; it stops receiving
    /// notifications once its last `Rc` is dropped.
    pub fn add_listener<L: GameListener + 'static>(&mut self, listener: &Rc<L>) {
        let weak: Weak<L> = Rc::downgrade(listener);
        self.listeners.retain(|slot| slot.listener.strong_count() > 0);
        self.listeners.push(ListenerSlot {
            listener: weak,
            saw_game_over: false,
        });
    }

    pub fn remove_listener<L: GameListener + 'static>(&mut self, listener: &Rc<L>) -> bool {
        self.listeners.retain(|slot| slot.listener.strong_count() > 0);
        let target = Rc::as_ptr(listener);
        match self
            .listeners
            .iter()
            .position(|slot| std::ptr::addr_eq(slot.listener.as_ptr(), target))
        {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .iter()
            .filter(|slot| slot.listener.strong_count() > 0)
            .count()
    }

    fn notify_change(&self) {
        for slot in &self.listeners {
            if let Some(listener) = slot.listener.upgrade() {
                listener.on_change(self);
            }
        }
    }

    // Each listener hears about a given game over once, including listeners
    // attached after the game already ended.
    fn signal_game_over(&mut self) {
        let pending: Vec<Rc<dyn GameListener>> = self
            .listeners
            .iter_mut()
            .filter(|slot| !slot.saw_game_over)
            .filter_map(|slot| {
                let listener = slot.listener.upgrade()?;
                slot.saw_game_over = true;
                Some(listener)
            })
            .collect();
        for listener in pending {
            listener.on_game_over(self);
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;

    pub fn empty_grid(width: usize, height: usize) -> Grid {
        Grid::new(width, height)
    }

    pub fn fill_row(grid: &mut Grid, row: usize) {
        for col in 0..grid.width() {
            grid.set(row, col, 1);
        }
    }

    pub fn fill_row_with_gap(grid: &mut Grid, row: usize, gap_col: usize) {
        for col in 0..grid.width() {
            if col != gap_col {
                grid.set(row, col, 1);
            }
        }
    }

    #[derive(Default)]
    pub struct RecordingListener {
        changes: std::cell::Cell<usize>,
        game_overs: std::cell::Cell<usize>,
    }

    impl RecordingListener {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn changes(&self) -> usize {
            self.changes.get()
        }

        pub fn game_overs(&self) -> usize {
            self.game_overs.get()
        }
    }

    impl GameListener for RecordingListener {
        fn on_change(&self, _game: &GameState) {
            self.changes.set(self.changes.get() + 1);
        }

        fn on_game_over(&self, _game: &GameState) {
            self.game_overs.set(self.game_overs.get() + 1);
        }
    }
}
