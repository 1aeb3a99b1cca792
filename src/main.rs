use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{self, stdout, Stdout},
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::debug;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use blockfall::{
    config::{DEFAULT_COLORS, DEFAULT_HEIGHT, DEFAULT_WIDTH},
    GameConfig, GameListener, GameState, RandomPieceSource,
};

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser, Debug)]
#[command(author, version, about = "Falling-block puzzle in the terminal", long_about = None)]
struct Args {
    /// Number of columns on the board
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: usize,
    /// Number of rows on the board
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,
    /// Palette size, counting the empty color
    #[arg(long, default_value_t = DEFAULT_COLORS)]
    colors: u8,
    /// Seed for a reproducible piece sequence
    #[arg(long)]
    seed: Option<u64>,
    /// Write logs here (filter with RUST_LOG, default info)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    // stderr would draw over the alternate screen, so no file means no logs
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

// ============================================================================
// Visual Constants
// ============================================================================

const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";

const PALETTE: [Color; 8] = [
    Color::Black,
    Color::Blue,
    Color::Red,
    Color::Green,
    Color::Cyan,
    Color::Magenta,
    Color::Rgb(255, 165, 0),
    Color::Yellow,
];

fn cell_color(value: u8) -> Color {
    if value == 0 {
        PALETTE[0]
    } else {
        PALETTE[1 + (value as usize - 1) % (PALETTE.len() - 1)]
    }
}

// ============================================================================
// Observers
// ============================================================================

struct ScoreLabel {
    text: RefCell<String>,
}

impl ScoreLabel {
    fn new(game: &GameState) -> Rc<Self> {
        let label = Rc::new(Self {
            text: RefCell::new(String::new()),
        });
        label.on_change(game);
        label
    }
}

impl GameListener for ScoreLabel {
    fn on_change(&self, game: &GameState) {
        *self.text.borrow_mut() = game.score().to_string();
    }

    fn on_game_over(&self, _game: &GameState) {}
}

/// Shows speed as 1..=10 rather than the raw tick interval.
struct LevelLabel {
    text: RefCell<String>,
}

impl LevelLabel {
    fn new(game: &GameState) -> Rc<Self> {
        let label = Rc::new(Self {
            text: RefCell::new(String::new()),
        });
        label.on_change(game);
        label
    }
}

impl GameListener for LevelLabel {
    fn on_change(&self, game: &GameState) {
        *self.text.borrow_mut() = (11 - game.level() / 100).to_string();
    }

    fn on_game_over(&self, _game: &GameState) {}
}

struct GameOverOverlay {
    visible: Cell<bool>,
    final_score: Cell<u32>,
}

impl GameOverOverlay {
    fn new(game: &GameState) -> Rc<Self> {
        Rc::new(Self {
            visible: Cell::new(game.is_finished()),
            final_score: Cell::new(game.score()),
        })
    }
}

impl GameListener for GameOverOverlay {
    fn on_change(&self, game: &GameState) {
        if !game.is_finished() {
            self.visible.set(false);
        }
        self.final_score.set(game.score());
    }

    fn on_game_over(&self, game: &GameState) {
        self.visible.set(true);
        self.final_score.set(game.score());
    }
}

struct Hud {
    score: Rc<ScoreLabel>,
    level: Rc<LevelLabel>,
    game_over: Rc<GameOverOverlay>,
}

impl Hud {
    fn attach(game: &mut GameState) -> Self {
        let hud = Self {
            score: ScoreLabel::new(game),
            level: LevelLabel::new(game),
            game_over: GameOverOverlay::new(game),
        };
        game.add_listener(&hud.score);
        game.add_listener(&hud.level);
        game.add_listener(&hud.game_over);
        hud
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Fixed-rate tick source. Restarts whenever the game's level changes.
struct Scheduler {
    level: u32,
    interval: Duration,
    next_tick: Instant,
}

impl Scheduler {
    fn start(game: &mut GameState) -> Self {
        let mut scheduler = Self {
            level: game.level(),
            interval: Duration::from_millis(game.tick_duration_ms()),
            next_tick: Instant::now(),
        };
        scheduler.restart(game);
        scheduler
    }

    // Like a fixed-rate executor with no initial delay, the first tick fires
    // at once; the armed gate swallows it.
    fn restart(&mut self, game: &mut GameState) {
        self.level = game.level();
        self.interval = Duration::from_millis(game.tick_duration_ms());
        self.next_tick = Instant::now();
        game.arm_first_tick();
        debug!("scheduler restarted at {:?}", self.interval);
    }

    fn timeout(&self) -> Duration {
        self.next_tick.saturating_duration_since(Instant::now())
    }

    fn poll(&mut self, game: &mut GameState) {
        if game.level() != self.level {
            self.restart(game);
        }
        let now = Instant::now();
        if now >= self.next_tick {
            game.step();
            self.next_tick += self.interval;
            if self.next_tick < now {
                self.next_tick = now + self.interval;
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, game: &GameState, hud: &Hud) {
    let area = frame.size();
    let (width, height) = game.size();

    let grid_display_width = (width as u16).saturating_mul(2).saturating_add(2);
    let grid_display_height = (height as u16).saturating_add(2);
    let info_width = 14;
    let main_area = centered_rect(
        grid_display_width + info_width + 2,
        grid_display_height + 2,
        area,
    );

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(info_width),
    ])
    .split(vertical[0]);

    render_grid(frame, game, horizontal[0]);
    render_info(frame, game, hud, horizontal[1]);

    let controls = Paragraph::new(Line::from(
        "←→: Move | ↑: Rotate | ↓: Drop | Space: Down | +/-: Speed | P: Pause | R: Restart | Q: Quit",
    ))
    .alignment(Alignment::Center)
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(controls, vertical[1]);

    if hud.game_over.visible.get() {
        render_game_over(frame, hud, area);
    } else if game.is_paused() {
        render_paused(frame, area);
    }
}

fn render_grid(frame: &mut Frame, game: &GameState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Blockfall ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visual = game.render_grid();
    let lines: Vec<Line> = visual
        .rows()
        .map(|row| {
            Line::from(
                row.iter()
                    .map(|&value| {
                        if value == 0 {
                            Span::raw(EMPTY_CHAR)
                        } else {
                            Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(value)))
                        }
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_info(frame: &mut Frame, game: &GameState, hud: &Hud, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(hud.score.text.borrow().clone()),
        Line::from(""),
        Line::from(Span::styled("Level", Style::default().fg(Color::Green))),
        Line::from(hud.level.text.borrow().clone()),
        Line::from(""),
        Line::from(Span::styled("Tick", Style::default().fg(Color::Cyan))),
        Line::from(format!("{} ms", game.tick_duration_ms())),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_game_over(frame: &mut Frame, hud: &Hud, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", hud.game_over.final_score.get())),
        Line::from(""),
        Line::from(Span::styled(
            "R: Restart | Q: Quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(paragraph, centered_rect(24, 9, area));
}

fn render_paused(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("PAUSED", Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled(
            "Press P to continue",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Paused ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(paragraph, centered_rect(24, 7, area));
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut game: GameState) -> io::Result<()> {
    let hud = Hud::attach(&mut game);
    let mut scheduler = Scheduler::start(&mut game);

    loop {
        terminal.draw(|frame| render(frame, &game, &hud))?;

        if event::poll(scheduler.timeout())? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => break,
                        KeyCode::Char('p') | KeyCode::Char('P') => game.pause(),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            game.reset();
                            scheduler.restart(&mut game);
                        }
                        KeyCode::Left => {
                            game.move_left();
                        }
                        KeyCode::Right => {
                            game.move_right();
                        }
                        KeyCode::Up => {
                            game.rotate();
                        }
                        KeyCode::Down => {
                            game.hard_drop();
                        }
                        KeyCode::Char(' ') => {
                            game.slide_down();
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => game.level_up(),
                        KeyCode::Char('-') => game.level_down(),
                        _ => {}
                    }
                }
            }
        }

        scheduler.poll(&mut game);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = GameConfig::new(args.width, args.height, args.colors)?;
    let source = match args.seed {
        Some(seed) => RandomPieceSource::seeded(seed),
        None => RandomPieceSource::new(),
    };
    let game = GameState::with_source(config, Box::new(source))?;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run(&mut terminal, game);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result.context("terminal session failed")
}
