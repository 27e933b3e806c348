//! Tetratui — classic falling-block puzzle game in the terminal.

mod app;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that the game engine is constructed from.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: u16,
    pub height: u16,
    pub tick_interval_ms: u64,
    pub seed: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        width: args.width,
        height: args.height,
        tick_interval_ms: args.tick_interval_ms,
        seed: args.seed,
    };
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// Classic falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tetratui",
    version,
    about = "Classic falling-block puzzle in the terminal. Stack the pieces, clear full rows to score.",
    long_about = "Tetratui is a terminal rendition of the classic falling-block puzzle.\n\n\
        Pieces fall at a fixed cadence and lock when they land; completed rows vanish \
        for 10 points each. The game ends when a new piece has no room to spawn.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up    Rotate    Down    Soft drop\n  P           Pause   R     Restart   Q / Esc Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i  Rotate  j       Soft drop\n\n\
        Hold a movement key to keep the piece moving. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board width in columns.
    #[arg(long, default_value = "10", value_name = "COLS",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub width: u16,

    /// Board height in rows.
    #[arg(long, default_value = "22", value_name = "ROWS",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub height: u16,

    /// Gravity interval in milliseconds (one forced downward step).
    #[arg(long, default_value = "500", value_name = "MS",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_ms: u64,

    /// Seed for the piece generator (random each run if not set).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u32>,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
