//! Terminal front-end: band gauges, spectrum, and the step grid.
//!
//! Polls the publisher's current snapshot once per drawn frame and
//! drives the frame-throttled scheduler policy from the same loop.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline},
    Frame,
};
use std::time::Duration;

use crate::audio::{EnergyPublisher, EnergySnapshot, SamplingScheduler};
use crate::engine::DrumMachine;
use crate::sequencer::{INSTRUMENT_NAMES, STEP_COUNT, VOICE_COUNT};

/// Frame pacing for the draw loop (~30 fps)
const FRAME_BUDGET: Duration = Duration::from_millis(33);

struct Cursor {
    row: usize,
    col: usize,
}

/// Run the terminal UI until the user quits.
pub fn run(
    engine: &DrumMachine,
    publisher: &EnergyPublisher,
    scheduler: &SamplingScheduler,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let mut cursor = Cursor { row: 0, col: 0 };

    let result = loop {
        scheduler.on_frame();

        let snapshot = publisher.current();
        let pattern = engine.pattern();
        let playing = engine.is_playing();
        let step = engine.current_step();

        if let Err(e) = terminal.draw(|frame| {
            draw(frame, &snapshot, &pattern, playing, step, &cursor);
        }) {
            break Err(e.into());
        }

        if event::poll(FRAME_BUDGET)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                    KeyCode::Char(' ') => engine.toggle_play(),
                    KeyCode::Up => cursor.row = cursor.row.saturating_sub(1),
                    KeyCode::Down => cursor.row = (cursor.row + 1).min(VOICE_COUNT - 1),
                    KeyCode::Left => cursor.col = cursor.col.saturating_sub(1),
                    KeyCode::Right => cursor.col = (cursor.col + 1).min(STEP_COUNT - 1),
                    KeyCode::Enter | KeyCode::Char('x') => {
                        engine.toggle_step(cursor.row, cursor.col)
                    }
                    _ => {}
                }
            }
        }
    };

    ratatui::restore();
    result
}

fn draw(
    frame: &mut Frame,
    snapshot: &EnergySnapshot,
    pattern: &[[bool; STEP_COUNT]; VOICE_COUNT],
    playing: bool,
    current_step: usize,
    cursor: &Cursor,
) {
    let [bands, spectrum, grid, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(6),
        Constraint::Length(VOICE_COUNT as u16 + 2),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_band_gauges(frame, bands, snapshot);
    draw_spectrum(frame, spectrum, snapshot);
    draw_grid(frame, grid, pattern, playing, current_step, cursor);

    let hint = if playing {
        "space pause · arrows move · enter toggle step · q quit"
    } else {
        "space play · arrows move · enter toggle step · q quit"
    };
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
        help,
    );
}

fn draw_band_gauges(frame: &mut Frame, area: Rect, snapshot: &EnergySnapshot) {
    let cells = Layout::horizontal([Constraint::Ratio(1, 4); 4]).areas::<4>(area);
    let bands = [
        ("bass", snapshot.bass_energy, Color::Red),
        ("mid", snapshot.mid_energy, Color::Yellow),
        ("high", snapshot.high_energy, Color::Cyan),
        ("full", snapshot.full_energy, Color::Magenta),
    ];
    for ((label, energy, color), cell) in bands.into_iter().zip(cells) {
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(label))
            .gauge_style(Style::default().fg(color))
            .ratio(energy.clamp(0.0, 1.0) as f64);
        frame.render_widget(gauge, cell);
    }
}

fn draw_spectrum(frame: &mut Frame, area: Rect, snapshot: &EnergySnapshot) {
    let data: Vec<u64> = snapshot.audio_data.iter().map(|&b| b as u64).collect();
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title("spectrum"))
        .max(255)
        .style(Style::default().fg(Color::Green))
        .data(&data);
    frame.render_widget(sparkline, area);
}

fn draw_grid(
    frame: &mut Frame,
    area: Rect,
    pattern: &[[bool; STEP_COUNT]; VOICE_COUNT],
    playing: bool,
    current_step: usize,
    cursor: &Cursor,
) {
    let mut lines = Vec::with_capacity(VOICE_COUNT);
    for (row, steps) in pattern.iter().enumerate() {
        let mut spans = vec![Span::styled(
            format!("{:<7}", INSTRUMENT_NAMES[row]),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        for (col, &on) in steps.iter().enumerate() {
            let symbol = if on { " ■ " } else { " · " };
            let mut style = if on {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if playing && col == current_step {
                style = style.bg(Color::Blue);
            }
            if row == cursor.row && col == cursor.col {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(symbol, style));
        }
        lines.push(Line::from(spans));
    }

    let title = if playing { "pattern ▶" } else { "pattern ■" };
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}
