//! App: terminal init, main loop, tick and key handling.

use crate::game::{GameState, Intent, Step, UniformShapes};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::GameConfig;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
}

pub struct App {
    config: GameConfig,
    state: GameState,
    screen: Screen,
    paused: bool,
    /// Session best across restarts; never persisted.
    best_score: u32,
    last_tick: Instant,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// Rows removed by the most recent lock, kept while the flash runs.
    flash_rows: Vec<usize>,
    /// TachyonFX fade for cleared rows (created when the flash starts).
    line_clear_effect: Option<Effect>,
    line_clear_effect_process_time: Option<Instant>,
    /// TachyonFX fade-in for the game-over popup.
    game_over_effect: Option<Effect>,
    game_over_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let shapes = match config.seed {
            Some(seed) => UniformShapes::from_seed(seed),
            None => UniformShapes::new(),
        };
        let state = GameState::new(theme, &config, Box::new(shapes))?;
        Ok(Self {
            config,
            state,
            screen: Screen::Playing,
            paused: false,
            best_score: 0,
            last_tick: Instant::now(),
            repeat_state: None,
            last_repeat_fire: None,
            flash_rows: Vec::new(),
            line_clear_effect: None,
            line_clear_effect_process_time: None,
            game_over_effect: None,
            game_over_effect_process_time: None,
        })
    }

    fn restart_game(&mut self) {
        self.state.restart();
        self.screen = Screen::Playing;
        self.paused = false;
        self.last_tick = Instant::now();
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.flash_rows.clear();
        self.line_clear_effect = None;
        self.line_clear_effect_process_time = None;
        self.game_over_effect = None;
        self.game_over_effect_process_time = None;
    }

    /// React to what the engine reported: clear key repeat when the piece
    /// changed hands, start the row flash, switch screens on game over.
    fn apply_step(&mut self, step: Step) {
        match step {
            Step::Locked { cleared } => {
                self.repeat_state = None;
                self.last_repeat_fire = None;
                if !cleared.is_empty() {
                    self.flash_rows = cleared;
                    self.line_clear_effect = None;
                    self.line_clear_effect_process_time = None;
                }
                if self.state.game_over {
                    self.screen = Screen::GameOver;
                    self.game_over_effect = None;
                    self.game_over_effect_process_time = None;
                }
            }
            Step::Falling | Step::Ignored => {}
        }
    }

    fn apply_action(&mut self, action: Action) {
        let intent = match action {
            Action::MoveLeft => Intent::MoveLeft,
            Action::MoveRight => Intent::MoveRight,
            Action::SoftDrop => Intent::SoftDrop,
            Action::Rotate => Intent::Rotate,
            _ => return,
        };
        let step = self.state.handle_intent(intent);
        self.apply_step(step);
    }

    fn tick_repeat(&mut self) {
        let now = Instant::now();
        let (action, first) = match self.repeat_state {
            Some(s) => s,
            None => return,
        };
        if !matches!(
            action,
            Action::MoveLeft | Action::MoveRight | Action::SoftDrop
        ) {
            return;
        }
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Attempt to enable enhanced keyboard for Release events (drives DAS)
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);
        loop {
            let now = Instant::now();
            self.best_score = self.best_score.max(self.state.score);

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    self.paused,
                    self.best_score,
                    f.area(),
                    &self.flash_rows,
                    &mut self.line_clear_effect,
                    &mut self.line_clear_effect_process_time,
                    &mut self.game_over_effect,
                    &mut self.game_over_effect_process_time,
                    now,
                )
            })?;

            if self.line_clear_effect.as_ref().is_some_and(|e| e.done()) {
                self.flash_rows.clear();
                self.line_clear_effect = None;
                self.line_clear_effect_process_time = None;
            }

            // Limit event polling so rendering stays responsive (~60 FPS)
            let frame_duration = Duration::from_millis(16);
            let timeout = frame_duration.saturating_sub(now.elapsed());

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key);

                        // Ignore OS repeats; Release clears our own repeat.
                        if key.kind != KeyEventKind::Press {
                            if key.kind == KeyEventKind::Release
                                && self.repeat_state.map(|(a, _)| a) == Some(action)
                            {
                                self.repeat_state = None;
                                self.last_repeat_fire = None;
                            }
                            continue;
                        }
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            continue;
                        }

                        match self.screen {
                            Screen::Playing => {
                                if self.paused {
                                    match action {
                                        Action::Pause => self.paused = false,
                                        Action::Quit => return Ok(()),
                                        _ => {}
                                    }
                                } else {
                                    match action {
                                        Action::Pause => self.paused = true,
                                        Action::Quit => return Ok(()),
                                        Action::Restart => self.restart_game(),
                                        Action::None => {}
                                        _ => {
                                            self.apply_action(action);
                                            let repeatable = matches!(
                                                action,
                                                Action::MoveLeft
                                                    | Action::MoveRight
                                                    | Action::SoftDrop
                                            );
                                            if repeatable && self.screen == Screen::Playing {
                                                self.repeat_state =
                                                    Some((action, Instant::now()));
                                                self.last_repeat_fire = None;
                                            }
                                        }
                                    }
                                }
                            }
                            Screen::GameOver => match action {
                                Action::Quit => return Ok(()),
                                Action::Restart => self.restart_game(),
                                _ => {}
                            },
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.tick_repeat();
                if self.last_tick.elapsed() >= tick_interval {
                    self.last_tick = Instant::now();
                    let step = self.state.tick();
                    self.apply_step(step);
                }
            }
        }
    }
}
