// src/marker_controller.rs

use std::fmt::Write as FmtWrite;
use std::io::{stdout, Write};
use std::path::Path;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};
use log::{info, warn};

use crate::error::MarkerError;
use crate::markers::pending::Toggle;
use crate::markers::{Marker, MarkerId};
use crate::playback::Transport;
use crate::session::MarkerSession;
use crate::AudioPlayer;

/// Marker rows visible at once.
const LIST_ROWS: usize = 12;

/// What a key press asks for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    TogglePlay,
    SeekBy(f64),
    Volume(f32),
    MarkStart,
    MarkEnd,
    SelectPrev,
    SelectNext,
    PlaySelected,
    DeleteSelected,
    OpenPrompt,
    Quit,
}

/// Maps a key in normal mode to an action.
pub fn map_key(key: KeyCode, modifiers: KeyModifiers, seek_step: f64) -> Option<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Action::Quit);
    }

    let action = match key {
        KeyCode::Char(' ') => Action::TogglePlay,
        KeyCode::Right => Action::SeekBy(seek_step),
        KeyCode::Left => Action::SeekBy(-seek_step),
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Volume(0.1),
        KeyCode::Char('-') => Action::Volume(-0.1),
        KeyCode::Char('m') | KeyCode::Char('M') => Action::MarkStart,
        KeyCode::Char('e') | KeyCode::Char('E') => Action::MarkEnd,
        KeyCode::Up => Action::SelectPrev,
        KeyCode::Down => Action::SelectNext,
        KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('P') => Action::PlaySelected,
        KeyCode::Delete | KeyCode::Backspace | KeyCode::Char('x') | KeyCode::Char('X') => {
            Action::DeleteSelected
        }
        KeyCode::Char('o') | KeyCode::Char('O') => Action::OpenPrompt,
        KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Clone, Debug, PartialEq)]
enum InputMode {
    Normal,
    /// Typing the path of a file to open.
    OpenPath(String),
}

/// Status line message.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Info(String),
    /// Shown highlighted until the next key press.
    Alert(String),
}

#[derive(Clone, Copy, Debug)]
pub struct ControllerSettings {
    pub seek_step: f64,
}

/// Terminal front end: owns the session and the loaded player, turns keys
/// into session operations and redraws the screen when it changes.
pub struct MarkerController {
    session: MarkerSession,
    player: Option<AudioPlayer>,
    settings: ControllerSettings,
    selected: usize,
    mode: InputMode,
    notice: Option<Notice>,
    quit: bool,

    // Last frame written to the terminal; identical frames are skipped.
    last_frame: String,
    draw_buffer: String,
}

impl MarkerController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            session: MarkerSession::new(),
            player: None,
            settings,
            selected: 0,
            mode: InputMode::Normal,
            notice: Some(Notice::Info("Press [o] to open an audio file".to_string())),
            quit: false,
            last_frame: String::new(),
            draw_buffer: String::with_capacity(4096),
        }
    }

    pub fn session(&self) -> &MarkerSession {
        &self.session
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Opens `path` and replaces the current source. On failure the current
    /// source and its markers stay untouched.
    pub fn load_source(&mut self, path: &str) -> Result<(), MarkerError> {
        let player = AudioPlayer::open(path).map_err(|e| MarkerError::resource_load(path, &e))?;

        self.player = Some(player);
        self.session.source_loaded(path);
        self.selected = 0;
        self.notice = Some(Notice::Info(format!("Loaded {}", display_name(path))));
        Ok(())
    }

    /// Startup default. Failure only means nothing is loaded.
    pub fn load_default(&mut self, path: &str) {
        if let Err(e) = self.load_source(path) {
            warn!("{e}; open an audio file manually");
        }
    }

    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if let InputMode::OpenPath(buffer) = &mut self.mode {
            match key {
                KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Enter => {
                    let path = buffer.trim().to_string();
                    self.mode = InputMode::Normal;
                    if !path.is_empty() {
                        self.open_from_prompt(&path);
                    }
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => buffer.push(c),
                _ => {}
            }
            return;
        }

        // Alerts stay up until the user does something else.
        if matches!(self.notice, Some(Notice::Alert(_))) {
            self.notice = None;
        }

        if let Some(action) = map_key(key, modifiers, self.settings.seek_step) {
            self.apply(action);
        }
    }

    fn open_from_prompt(&mut self, path: &str) {
        if let Err(e) = self.load_source(path) {
            warn!("{e}");
            self.notice = Some(Notice::Alert(e.to_string()));
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit = true,
            Action::OpenPrompt => self.mode = InputMode::OpenPath(String::new()),
            Action::SelectPrev => self.selected = self.selected.saturating_sub(1),
            Action::SelectNext => {
                let len = self.session.markers().len();
                if self.selected + 1 < len {
                    self.selected += 1;
                }
            }
            Action::DeleteSelected => self.delete_selected(),
            _ => self.apply_transport(action),
        }
    }

    /// Actions that need a loaded source.
    fn apply_transport(&mut self, action: Action) {
        let Some(player) = self.player.as_mut() else {
            self.notice = Some(Notice::Alert("No audio loaded".to_string()));
            return;
        };

        match action {
            Action::TogglePlay => player.toggle_playback(),
            Action::SeekBy(delta) => {
                if let Err(e) = player.seek_by_secs(delta) {
                    warn!("seek failed: {e:#}");
                }
            }
            Action::Volume(delta) => player.set_volume(player.volume() + delta),
            Action::MarkStart => {
                self.notice = match self.session.toggle_mark_start(&*player) {
                    Toggle::Started(start) => Some(Notice::Info(format!("Start marked at {start:.2}s"))),
                    Toggle::Cancelled(_) => Some(Notice::Info("Mark cancelled".to_string())),
                };
            }
            Action::MarkEnd => match self.session.mark_end(&*player) {
                Ok(id) => {
                    let len = self.session.markers().len();
                    self.selected = len.saturating_sub(1);
                    self.notice = Some(Notice::Info(format!("Added marker {id}")));
                }
                Err(e) => self.notice = Some(Notice::Alert(e.to_string())),
            },
            Action::PlaySelected => {
                let Some(marker) = self.session.markers().iter().nth(self.selected).copied() else {
                    return;
                };
                if let Err(e) = self.session.play_marker(marker.id, player) {
                    warn!("could not play marker {}: {e:#}", marker.id);
                    self.notice = Some(Notice::Alert(format!("Playback failed: {e}")));
                }
            }
            Action::Quit
            | Action::OpenPrompt
            | Action::SelectPrev
            | Action::SelectNext
            | Action::DeleteSelected => {}
        }
    }

    fn delete_selected(&mut self) {
        let Some(marker) = self.selected_marker() else {
            return;
        };
        self.session.delete_marker(marker.id);
        let len = self.session.markers().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn selected_marker(&self) -> Option<Marker> {
        self.session.markers().iter().nth(self.selected).copied()
    }

    /// Position update: end-of-marker and end-of-track checks.
    pub fn tick(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };

        if let Some(id) = self.session.on_time_update(player) {
            self.notice = Some(Notice::Info(format!("Finished marker {id}")));
        }

        let total = player.total_duration();
        if player.is_playing() && !total.is_zero() && player.position() >= total {
            player.pause();
            info!("track finished");
            self.notice = Some(Notice::Info("Track finished".to_string()));
        }
    }

    pub fn run_tick(&mut self) -> Result<(), anyhow::Error> {
        self.tick();
        self.compose_frame();

        if self.draw_buffer == self.last_frame {
            return Ok(());
        }

        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        write!(stdout, "{}", MoveTo(0, 0))?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        write!(stdout, "{}", Clear(ClearType::FromCursorDown))?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;

        std::mem::swap(&mut self.last_frame, &mut self.draw_buffer);
        Ok(())
    }

    fn compose_frame(&mut self) {
        let buf = &mut self.draw_buffer;
        buf.clear();

        match &self.player {
            Some(player) => {
                let state = if player.is_playing() { "▶ Playing" } else { "⏸ Paused " };
                let _ = write!(buf, "🎧 {}\x1b[K\r\n", display_name(player.path()));
                let _ = write!(
                    buf,
                    "🎵 {} / {}  {}  Vol {:.0}%\x1b[K\r\n",
                    format_clock(player.position()),
                    format_clock(player.total_duration()),
                    state,
                    player.volume() * 100.0
                );
            }
            None => {
                let _ = write!(buf, "🎧 no audio loaded\x1b[K\r\n\x1b[K\r\n");
            }
        }

        let pending = self.session.pending();
        let _ = write!(
            buf,
            "Start: {}   [m] {}   [e] Mark end\x1b[K\r\n\x1b[K\r\n",
            pending.display(),
            pending.toggle_label()
        );

        let markers = self.session.list();
        let _ = write!(buf, "Markers ({}):\x1b[K\r\n", markers.len());
        for row in marker_rows(&markers, self.selected, LIST_ROWS) {
            let _ = write!(buf, "{row}\x1b[K\r\n");
        }

        let _ = write!(buf, "\x1b[K\r\n");
        if let Some((id, end)) = self.session.playback().armed() {
            let marker = self.session.markers().find_marker(id);
            let _ = write!(buf, "{}\x1b[K\r\n", playing_status(id, end, marker));
        }

        match &self.mode {
            InputMode::OpenPath(buffer) => {
                let _ = write!(buf, "Open file: {buffer}_\x1b[K\r\n");
            }
            InputMode::Normal => match &self.notice {
                Some(Notice::Alert(msg)) => {
                    let _ = write!(buf, "\x1b[1;31m⚠ {msg}\x1b[0m\x1b[K\r\n");
                }
                Some(Notice::Info(msg)) => {
                    let _ = write!(buf, "{msg}\x1b[K\r\n");
                }
                None => {
                    let _ = write!(buf, "\x1b[K\r\n");
                }
            },
        }

        let _ = write!(
            buf,
            "[SPACE] Play/Pause | [←/→] Seek | [+/-] Volume | [↑/↓] Select | [ENTER] Play marker | [X] Delete | [O] Open | [Q] Quit\x1b[K\r\n"
        );
    }
}

/// Visible marker list rows, scrolled so `selected` stays on screen.
pub fn marker_rows(markers: &[Marker], selected: usize, max_rows: usize) -> Vec<String> {
    if markers.is_empty() {
        return vec!["  (none)".to_string()];
    }

    let max_rows = max_rows.max(1);
    let first = (selected + 1).saturating_sub(max_rows);
    markers
        .iter()
        .enumerate()
        .skip(first)
        .take(max_rows)
        .map(|(i, m)| {
            let cursor = if i == selected { '>' } else { ' ' };
            format!("{cursor} {:<5} {}", m.id.to_string(), m.label())
        })
        .collect()
}

/// Status line for the armed watch. The marker may have been deleted since.
fn playing_status(id: MarkerId, end: f64, marker: Option<Marker>) -> String {
    match marker {
        Some(m) => format!("Playing marker {id} ({:.2}s) until {end:.2}s", m.duration()),
        None => format!("Playing marker {id} until {end:.2}s"),
    }
}

/// `mm:ss.cc`
pub fn format_clock(d: Duration) -> String {
    let centis = d.as_millis() / 10;
    format!("{:02}:{:02}.{:02}", centis / 6000, (centis / 100) % 60, centis % 100)
}

fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(n: u64) -> Vec<Marker> {
        (1..=n)
            .map(|i| Marker {
                id: MarkerId(i),
                start: i as f64,
                end: i as f64 + 0.5,
            })
            .collect()
    }

    #[test]
    fn test_key_map() {
        let none = KeyModifiers::NONE;
        assert_eq!(map_key(KeyCode::Char('m'), none, 5.0), Some(Action::MarkStart));
        assert_eq!(map_key(KeyCode::Char('E'), none, 5.0), Some(Action::MarkEnd));
        assert_eq!(map_key(KeyCode::Left, none, 2.0), Some(Action::SeekBy(-2.0)));
        assert_eq!(map_key(KeyCode::Enter, none, 5.0), Some(Action::PlaySelected));
        assert_eq!(map_key(KeyCode::Delete, none, 5.0), Some(Action::DeleteSelected));
        assert_eq!(map_key(KeyCode::Char('z'), none, 5.0), None);
    }

    #[test]
    fn test_control_keys() {
        let ctrl = KeyModifiers::CONTROL;
        assert_eq!(map_key(KeyCode::Char('c'), ctrl, 5.0), Some(Action::Quit));
        assert_eq!(map_key(KeyCode::Char('m'), ctrl, 5.0), None);
    }

    #[test]
    fn test_marker_rows() {
        assert_eq!(marker_rows(&[], 0, 5), vec!["  (none)".to_string()]);

        let rows = marker_rows(&markers(2), 1, 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "  #1    1.00s - 1.50s");
        assert_eq!(rows[1], "> #2    2.00s - 2.50s");
    }

    #[test]
    fn test_marker_rows_scroll_to_selection() {
        let rows = marker_rows(&markers(10), 7, 3);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("#6"));
        assert!(rows[2].starts_with("> #8"));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::ZERO), "00:00.00");
        assert_eq!(format_clock(Duration::from_millis(83_456)), "01:23.45");
    }

    #[test]
    fn test_playing_status() {
        let m = Marker { id: MarkerId(3), start: 2.0, end: 5.25 };
        assert_eq!(
            playing_status(m.id, m.end, Some(m)),
            "Playing marker #3 (3.25s) until 5.25s"
        );
        // Deleted while its watch is still armed.
        assert_eq!(playing_status(m.id, m.end, None), "Playing marker #3 until 5.25s");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("/music/take 1.wav"), "take 1.wav");
        assert_eq!(display_name("clip.mp3"), "clip.mp3");
    }

    #[test]
    fn test_keys_without_audio_raise_alert() {
        let mut c = MarkerController::new(ControllerSettings { seek_step: 5.0 });

        c.handle_key(KeyCode::Char('m'), KeyModifiers::NONE);
        assert_eq!(c.notice, Some(Notice::Alert("No audio loaded".to_string())));
        assert!(!c.session().pending().is_pending());

        c.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(c.should_quit());
    }

    #[test]
    fn test_open_prompt_edits_and_aborts() {
        let mut c = MarkerController::new(ControllerSettings { seek_step: 5.0 });

        c.handle_key(KeyCode::Char('o'), KeyModifiers::NONE);
        for ch in "ab".chars() {
            c.handle_key(KeyCode::Char(ch), KeyModifiers::NONE);
        }
        c.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(c.mode, InputMode::OpenPath("a".to_string()));

        // 'q' is text while the prompt is open.
        c.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!c.should_quit());

        c.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(c.mode, InputMode::Normal);
    }

    #[test]
    fn test_failed_open_keeps_session() {
        let mut c = MarkerController::new(ControllerSettings { seek_step: 5.0 });

        let err = c.load_source("/nonexistent/audio.mp3").unwrap_err();
        assert!(matches!(err, MarkerError::ResourceLoad { .. }));
        assert_eq!(c.session().source(), None);

        // Default load failure is silent.
        c.load_default("/nonexistent/default.mp3");
        assert!(!matches!(c.notice, Some(Notice::Alert(_))));
    }
}
