//! Layout and drawing: playfield, sidebar, pause overlay, game over, colour strip.

use crate::app::Screen;
use crate::game::GameState;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each grid cell is drawn as 2 terminal columns by 1 row.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;

const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the cleared-row flash in ms.
const LINE_CLEAR_FLASH_MS: u32 = 350;
/// Duration of the game-over popup fade-in in ms.
const GAME_OVER_FADE_MS: u32 = 450;

/// Playfield size in terminal cells (border + grid) for given grid dimensions.
fn playfield_pixel_size(width: u16, height: u16) -> (u16, u16) {
    (width * CELL_WIDTH + 2, height * CELL_HEIGHT + 2)
}

/// Playfield inner rect (board only, no border) for given area and state;
/// matches the draw_game layout.
fn playfield_board_rect(area: Rect, state: &GameState) -> Rect {
    let (pw, ph) = playfield_pixel_size(state.board.width as u16, state.board.height as u16);
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    let playfield_outer = Rect {
        x,
        y,
        width: pw.min(area.width),
        height: ph.min(area.height),
    };
    Rect {
        x: playfield_outer.x + 1,
        y: playfield_outer.y + 1,
        width: (state.board.width as u16 * CELL_WIDTH)
            .min(playfield_outer.width.saturating_sub(2)),
        height: (state.board.height as u16 * CELL_HEIGHT)
            .min(playfield_outer.height.saturating_sub(2)),
    }
}

/// Build set of buffer (x, y) positions covered by the flashing rows.
fn flashing_buffer_positions(board_rect: Rect, flash_rows: &[usize]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &row in flash_rows {
        let by = board_rect.y + (row as u16) * CELL_HEIGHT;
        if by >= board_rect.y + board_rect.height {
            continue;
        }
        for bx in board_rect.x..board_rect.x + board_rect.width {
            set.insert((bx, by));
        }
    }
    set
}

/// Draw current screen, with optional pause overlay.
/// When `flash_rows` is non-empty, applies a TachyonFX white flash over the
/// rows that were just cleared and updates `line_clear_effect` /
/// `line_clear_process_time`; the app drops the rows once the effect is done.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    paused: bool,
    best_score: u32,
    area: Rect,
    flash_rows: &[usize],
    line_clear_effect: &mut Option<Effect>,
    line_clear_process_time: &mut Option<Instant>,
    game_over_effect: &mut Option<Effect>,
    game_over_process_time: &mut Option<Instant>,
    now: Instant,
) {
    draw_game(frame, state, best_score, area);
    if !flash_rows.is_empty() {
        apply_line_clear_flash(
            frame,
            state,
            area,
            flash_rows,
            line_clear_effect,
            line_clear_process_time,
            now,
        );
    }
    match screen {
        Screen::Playing => {
            if paused {
                draw_pause_overlay(frame, state, area);
            }
        }
        Screen::GameOver => draw_game_over(
            frame,
            state,
            best_score,
            area,
            game_over_effect,
            game_over_process_time,
            now,
        ),
    }
}

/// Create or update the cleared-row flash and process it
/// (white fading into the collapsed board content).
fn apply_line_clear_flash(
    frame: &mut Frame,
    state: &GameState,
    area: Rect,
    flash_rows: &[usize],
    line_clear_effect: &mut Option<Effect>,
    line_clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board_rect = playfield_board_rect(area, state);
    let delta = line_clear_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *line_clear_process_time = Some(now);

    if line_clear_effect.is_none() {
        let flashing_set = flashing_buffer_positions(board_rect, flash_rows);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            flashing_set.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_from(
            Color::White,
            Color::White,
            (LINE_CLEAR_FLASH_MS, Interpolation::Linear),
        )
        .with_filter(filter)
        .with_area(board_rect);
        *line_clear_effect = Some(effect);
    }

    if let Some(effect) = line_clear_effect {
        frame.render_effect(effect, board_rect, tfx_delta);
    }
}

/// Draw game: playfield + sidebar; use full area and center the board.
fn draw_game(frame: &mut Frame, state: &GameState, best_score: u32, area: Rect) {
    let (pw, ph) = playfield_pixel_size(state.board.width as u16, state.board.height as u16);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);

    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);

    let active_area = vert_chunks[1];

    let (playfield_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_playfield(frame, state, playfield_area);
    draw_sidebar(frame, state, best_score, sidebar_area);
}

fn draw_playfield(frame: &mut Frame, state: &GameState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.theme.div_line).bg(state.theme.bg))
        .title(Span::styled(
            " Tetratui ",
            Style::default().fg(state.theme.title),
        ));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let board_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: (state.board.width as u16 * CELL_WIDTH).min(inner.width),
        height: (state.board.height as u16 * CELL_HEIGHT).min(inner.height),
    };

    // Piece cells above the board (y < 0) are simply not drawn.
    let mut piece_cells: HashSet<(i32, i32)> = HashSet::new();
    let piece_color = state.piece.as_ref().map(|p| {
        piece_cells.extend(p.cells.iter().copied());
        state.piece_color(p)
    });

    let buf = frame.buffer_mut();
    for y in 0..state.board.height {
        for x in 0..state.board.width {
            let color = if piece_cells.contains(&(x, y)) {
                piece_color.unwrap_or(state.theme.frozen)
            } else if state.board.occupied(x, y) {
                state.theme.frozen
            } else {
                state.theme.bg
            };
            let rx = board_rect.x + (x as u16) * CELL_WIDTH;
            let ry = board_rect.y + (y as u16) * CELL_HEIGHT;
            if rx + CELL_WIDTH <= board_rect.x + board_rect.width
                && ry < board_rect.y + board_rect.height
            {
                buf.set_string(rx, ry, "  ", Style::default().bg(color));
            }
        }
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, best_score: u32, area: Rect) {
    let title_style = Style::default().fg(state.theme.title);
    let fg_style = Style::default().fg(state.theme.main_fg);
    let border_style = Style::default().fg(state.theme.div_line).bg(state.theme.bg);

    // Free-floating sections with their own borders; vertical layout with small gaps
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Stats (border + score, best, lines)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Colours (border + title + strip)
            Constraint::Length(1), // gap
            Constraint::Length(8), // Keys (border + 6 lines)
        ])
        .split(area);

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(best_score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Lines: ", title_style),
            Span::styled(state.lines_cleared.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines))
        .render(stats_inner, frame.buffer_mut());

    // --- Colours ---
    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[2]);
    colours_block.render(chunks[2], frame.buffer_mut());
    let colours_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(colours_inner);
    Paragraph::new(Line::from(Span::styled("Pieces", title_style)))
        .render(colours_layout[0], frame.buffer_mut());
    draw_colour_strip(frame, state, colours_layout[1]);

    // --- Keys ---
    let keys_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let keys_inner = keys_block.inner(chunks[4]);
    keys_block.render(chunks[4], frame.buffer_mut());
    let keys_lines = vec![
        Line::from(Span::styled("←/→  move", fg_style)),
        Line::from(Span::styled("↑    rotate", fg_style)),
        Line::from(Span::styled("↓    soft drop", fg_style)),
        Line::from(Span::styled("p    pause", fg_style)),
        Line::from(Span::styled("r    restart", fg_style)),
        Line::from(Span::styled("q    quit", fg_style)),
    ];
    Paragraph::new(ratatui::text::Text::from(keys_lines))
        .render(keys_inner, frame.buffer_mut());
}

/// Draw a row of 7 coloured blocks (piece palette).
fn draw_colour_strip(frame: &mut Frame, state: &GameState, area: Rect) {
    let block_w = (area.width / 7).max(1);
    for i in 0..7u8 {
        let r = Rect {
            x: area.x + u16::from(i) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        };
        let c = state.theme.piece_color(i);
        let p = Paragraph::new("█").style(Style::default().fg(c).bg(c));
        p.render(r, frame.buffer_mut());
    }
}

fn draw_pause_overlay(frame: &mut Frame, state: &GameState, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 6u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(state.theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(state.theme.div_line).bg(state.theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(
    frame: &mut Frame,
    state: &GameState,
    best_score: u32,
    area: Rect,
    game_over_effect: &mut Option<Effect>,
    game_over_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let popup_w = 32u16;
    let popup_h = 10u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {} ", state.score),
            Style::default().fg(state.theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Best: {} ", best_score),
            Style::default().fg(state.theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Lines: {} ", state.lines_cleared),
            Style::default().fg(state.theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " R — Restart    Q — Quit ",
            Style::default().fg(state.theme.main_fg).bold(),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(state.theme.div_line).bg(state.theme.bg))
            .title(Span::styled(
                " Tetratui ",
                Style::default().fg(state.theme.title),
            )),
    );
    p.render(popup, frame.buffer_mut());

    let delta = game_over_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *game_over_process_time = Some(now);

    if game_over_effect.is_none() {
        let effect = fx::fade_from(
            state.theme.bg,
            state.theme.bg,
            (GAME_OVER_FADE_MS, Interpolation::SineOut),
        )
        .with_area(popup);
        *game_over_effect = Some(effect);
    }
    if let Some(effect) = game_over_effect {
        frame.render_effect(effect, popup, TfxDuration::from_millis(delta_ms));
    }
}
