use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::{BarCell, ViewModel};
use crate::shared::TransportStatus;

const HELP: &str = "space play  r record  ←/→ seek bar  ↑/↓ track  m mute  n new  d delete \
                    [ ] loop  l unloop  x clear  c copy  v paste  k click  s save  e export  q quit";

pub fn render(frame: &mut Frame, area: Rect, vm: &ViewModel) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport line
            Constraint::Min(4),    // track timeline
            Constraint::Length(3), // help / message
        ])
        .split(area);

    draw_transport(frame, sections[0], vm);
    draw_timeline(frame, sections[1], vm);
    draw_footer(frame, sections[2], vm);
}

fn draw_transport(frame: &mut Frame, area: Rect, vm: &ViewModel) {
    let (label, color) = match vm.status {
        TransportStatus::Stopped => ("Stopped", Color::DarkGray),
        TransportStatus::Recording => ("Recording", Color::Red),
        TransportStatus::Playing => ("Playing", Color::Green),
    };

    let mut text = format!(
        "{label}: {:.2} s  bar {}",
        vm.elapsed.as_secs_f64(),
        vm.current_bar + 1
    );
    if let Some(region) = vm.loop_region {
        text += &format!(
            " [Looping Bars: {}-{}]",
            region.begin_bar + 1,
            region.end_bar + 1
        );
    }
    if vm.metronome_on {
        text += "  (click on)";
    }

    let line = Line::from(Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("barline")),
        area,
    );
}

fn draw_timeline(frame: &mut Frame, area: Rect, vm: &ViewModel) {
    let mut lines = Vec::with_capacity(vm.tracks.len());

    for (index, track) in vm.tracks.iter().enumerate() {
        let selected = index == vm.selected;
        let cursor = if selected { ">" } else { " " };
        let mute = if track.muted { "M" } else { " " };
        let mut spans = vec![Span::styled(
            format!("{cursor}{mute} {:<10} ", track.name),
            if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        )];

        for (bar_index, cell) in track.bars.iter().enumerate() {
            let glyph = match cell {
                BarCell::Empty => "····",
                BarCell::Partial => "▒▒▒▒",
                BarCell::Full => "████",
            };
            let mut style = Style::default().fg(if track.muted {
                Color::DarkGray
            } else {
                Color::Cyan
            });
            if bar_index == vm.current_bar {
                style = style.bg(Color::Blue);
            }
            spans.push(Span::styled(glyph, style));
            spans.push(Span::raw(" "));
        }

        lines.push(Line::from(spans));
    }

    if lines.is_empty() {
        lines.push(Line::from("no tracks — press r to record one"));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("tracks")),
        area,
    );
}

fn draw_footer(frame: &mut Frame, area: Rect, vm: &ViewModel) {
    let text = match &vm.message {
        Some(message) => message.clone(),
        None => HELP.to_string(),
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
