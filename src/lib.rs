//! Falling-block puzzle game core.
//!
//! [`GameState`] is a synchronous state machine: callers drive it with
//! command methods and an external scheduler calls [`GameState::step`] every
//! [`GameState::tick_duration_ms`] milliseconds. Observers attach through
//! [`GameListener`].

pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod piece;

pub use config::GameConfig;
pub use error::GameError;
pub use game::{GameListener, GameState, TickGate};
pub use grid::{Cell, Grid};
pub use piece::{
    PieceSource, Position, RandomPieceSource, SequencePieceSource, Shape, TetrominoKind,
};
