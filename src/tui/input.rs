use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use crate::shared::UiEvent;

// poll for one key and resolve it; main.rs decides what each event means
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<UiEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode) -> Vec<UiEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![UiEvent::Quit],
        KeyCode::Char(' ') => vec![UiEvent::TogglePlay],
        KeyCode::Char('r') => vec![UiEvent::ToggleRecord],

        KeyCode::Up => vec![UiEvent::SelectPrevTrack],
        KeyCode::Down => vec![UiEvent::SelectNextTrack],
        KeyCode::Left => vec![UiEvent::SeekBack],
        KeyCode::Right => vec![UiEvent::SeekForward],

        KeyCode::Char('m') => vec![UiEvent::ToggleMute],
        KeyCode::Char('n') => vec![UiEvent::NewTrack],
        KeyCode::Char('d') => vec![UiEvent::DeleteTrack],

        KeyCode::Char('[') => vec![UiEvent::SetLoopBegin],
        KeyCode::Char(']') => vec![UiEvent::SetLoopEnd],
        KeyCode::Char('l') => vec![UiEvent::ClearLoop],

        KeyCode::Char('x') => vec![UiEvent::ClearBar],
        KeyCode::Char('c') => vec![UiEvent::CopyBar],
        KeyCode::Char('v') => vec![UiEvent::PasteBar],

        KeyCode::Char('k') => vec![UiEvent::ToggleMetronome],
        KeyCode::Char('s') => vec![UiEvent::Save],
        KeyCode::Char('e') => vec![UiEvent::Export],

        _ => vec![],
    }
}
