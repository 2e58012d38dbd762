use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use reqwest::blocking::Client;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::config::{Config, UiColors};
use crate::country::{CountryKey, CountryRecord};
use crate::flag::{FlagImage, FlagRequest};
use crate::logging;
use crate::remote::{CountrySource, LoadHandle, LoadOutcome};
use crate::search;

use super::draw;
use super::overlay::{rect_contains, Overlay, OverlayHitArea, PointerTarget};
use super::panes::Focus;
use super::terminal::TerminalSession;

const DEFAULT_FONT_SIZE: (u16, u16) = (8, 16);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn create_image_picker() -> Picker {
    let mut picker = base_picker();
    picker.guess_protocol();
    picker
}

#[cfg(unix)]
fn base_picker() -> Picker {
    Picker::from_termios().unwrap_or_else(|_| Picker::new(DEFAULT_FONT_SIZE))
}

#[cfg(not(unix))]
fn base_picker() -> Picker {
    Picker::new(DEFAULT_FONT_SIZE)
}

/// Progress of the one-time country list load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

/// Card geometry from the last frame, for mouse hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardHit {
    pub area: Rect,
    pub button: Rect,
    pub index: usize,
}

pub struct HelpModal {
    pub scroll: usize,
    pub total_lines: usize,
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 0,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

pub struct App<'a> {
    config: &'a Config,
    // Taken by `mount`, so the load runs at most once
    source: Option<Box<dyn CountrySource>>,
    load: Option<LoadHandle>,
    pub load_state: LoadState,
    // Populated once by the load, never mutated afterwards
    pub countries: Vec<CountryRecord>,
    pub filtered: Vec<CountryKey>,
    pub search_input: Input,
    pub focus: Focus,
    // Cursor into `filtered`
    pub selected: usize,
    pub scroll_row: usize,
    pub grid_columns: usize,
    pub grid_rows: usize,
    pub card_hits: Vec<CardHit>,
    pub search_area: Option<Rect>,
    pub overlay: Overlay,
    pub overlay_hit: Option<OverlayHitArea>,
    pub help_modal: Option<HelpModal>,
    pub status: Option<String>,
    flag_client: Option<Client>,
    flag_request: Option<FlagRequest>,
    image_picker: Picker,
    flag_state: Option<Box<dyn StatefulProtocol>>,
    pub flag_data: Option<FlagImage>,
    pub flag_error: Option<String>,
}

impl<'a> App<'a> {
    /// `flag_client` enables flag image downloads in the overlay.
    pub fn new(
        config: &'a Config,
        source: Box<dyn CountrySource>,
        flag_client: Option<Client>,
    ) -> Self {
        Self {
            config,
            source: Some(source),
            load: None,
            load_state: LoadState::Loading,
            countries: Vec::new(),
            filtered: Vec::new(),
            search_input: Input::default(),
            focus: Focus::Search,
            selected: 0,
            scroll_row: 0,
            grid_columns: 1,
            grid_rows: 1,
            card_hits: Vec::new(),
            search_area: None,
            overlay: Overlay::Closed,
            overlay_hit: None,
            help_modal: None,
            status: None,
            flag_client,
            flag_request: None,
            image_picker: create_image_picker(),
            flag_state: None,
            flag_data: None,
            flag_error: None,
        }
    }

    /// Start the one-time background load. Later calls are ignored.
    pub fn mount(&mut self) {
        let Some(source) = self.source.take() else {
            tracing::debug!("viewer already mounted; not fetching again");
            return;
        };
        self.load = Some(LoadHandle::spawn(source));
        self.load_state = LoadState::Loading;
    }

    pub fn run(&mut self) -> Result<()> {
        let mut session = TerminalSession::enter()?;
        self.mount();

        let result = self.event_loop(session.terminal_mut());

        drop(session);
        self.unmount();
        result
    }

    /// Drop pending background work; late results find their channel closed.
    fn unmount(&mut self) {
        self.load = None;
        self.flag_request = None;
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: Backend,
    {
        loop {
            self.poll_background();
            draw::render(terminal, self)?;

            if event::poll(POLL_INTERVAL)? && self.handle_event(event::read()?) {
                break;
            }
        }
        Ok(())
    }

    /// Apply results from the load and flag workers, if any have arrived.
    pub fn poll_background(&mut self) {
        if let Some(outcome) = self.load.as_ref().and_then(LoadHandle::try_take) {
            self.load = None;
            self.apply_load(outcome);
        }

        let finished = self
            .flag_request
            .as_ref()
            .and_then(|request| request.try_take().map(|outcome| (request.key(), outcome)));
        if let Some((key, outcome)) = finished {
            self.flag_request = None;
            if self.overlay.key() != Some(key) {
                return;
            }
            match outcome {
                Ok(flag) => self.set_flag(Some(flag)),
                Err(err) => {
                    tracing::warn!(error = %err, "flag image unavailable");
                    self.flag_error = Some("FLAG UNAVAILABLE".to_string());
                }
            }
        }
    }

    fn apply_load(&mut self, outcome: LoadOutcome) {
        match outcome {
            Ok(countries) => {
                tracing::info!(count = countries.len(), "country list loaded");
                self.countries = countries;
                self.load_state = LoadState::Ready;
                self.refilter();
                self.set_status(format!("Loaded {} countries", self.countries.len()));
            }
            Err(err) => {
                tracing::error!(error = %err, details = ?err, "failed to load country list");
                self.load_state = LoadState::Failed;
                let log_hint = logging::log_dir()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|_| "the log file".to_string());
                self.set_status(format!("Failed to load countries; details in {log_hint}"));
            }
        }
    }

    fn refilter(&mut self) {
        self.filtered = search::filter(&self.countries, self.search_input.value());
        self.selected = 0;
        self.scroll_row = 0;
    }

    /// Returns true when the app should quit.
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                false
            }
            _ => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        // Ctrl+C always quits (hardcoded for safety)
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return true;
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return false;
        }

        if self.overlay.is_open() {
            self.handle_overlay_key(key);
            return false;
        }

        match self.focus {
            Focus::Search => {
                self.handle_search_key(key);
                false
            }
            Focus::Grid => self.handle_grid_key(key),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        let config = self.config;
        if key_matches_any(&key, &config.keys.overlay.close) {
            self.close_overlay();
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let input_keys = &config.keys.search_input;

        if key_matches_any(&key, &input_keys.cancel) || key_matches_any(&key, &input_keys.confirm) {
            self.focus = Focus::Grid;
            return;
        }

        // Single-character help bindings are typed, not triggered
        if key_matches_any(&key, &non_text_bindings(&config.keys.global.help)) {
            self.show_help();
            return;
        }

        if let Some(change) = self.search_input.handle_event(&Event::Key(key)) {
            if change.value {
                self.refilter();
            }
        }
    }

    fn handle_grid_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let global = &config.keys.global;
        let grid = &config.keys.grid;
        self.status = None;

        if key_matches_any(&key, &global.quit) {
            return true;
        }

        if key_matches_any(&key, &global.search) {
            self.focus = Focus::Search;
            return false;
        }

        if key_matches_any(&key, &global.help) {
            self.show_help();
            return false;
        }

        if key_matches_any(&key, &grid.open) {
            self.open_card(self.selected);
            return false;
        }

        let columns = self.grid_columns.max(1) as isize;
        let page = self.grid_rows.max(1) as isize * columns;
        let delta = if key_matches_any(&key, &grid.left) {
            -1
        } else if key_matches_any(&key, &grid.right) {
            1
        } else if key_matches_any(&key, &grid.up) {
            -columns
        } else if key_matches_any(&key, &grid.down) {
            columns
        } else if key_matches_any(&key, &grid.page_up) {
            -page
        } else if key_matches_any(&key, &grid.page_down) {
            page
        } else {
            // Unbound printable keys start a new search edit
            if let KeyCode::Char(_) = key.code {
                if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                    self.focus = Focus::Search;
                    self.handle_search_key(key);
                }
            }
            return false;
        };

        self.move_selection(delta);
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.handle_pointer_down(mouse.column, mouse.row)
            }
            MouseEventKind::ScrollDown if !self.modal_open() => {
                self.move_selection(self.grid_columns.max(1) as isize)
            }
            MouseEventKind::ScrollUp if !self.modal_open() => {
                self.move_selection(-(self.grid_columns.max(1) as isize))
            }
            _ => {}
        }
    }

    fn handle_pointer_down(&mut self, column: u16, row: u16) {
        if self.help_modal.is_some() {
            return;
        }

        if self.overlay.is_open() {
            // Geometry is known once the overlay has been drawn
            let Some(hit) = self.overlay_hit else {
                return;
            };
            match hit.classify(column, row) {
                PointerTarget::Backdrop | PointerTarget::CloseButton => self.close_overlay(),
                PointerTarget::Panel => {}
            }
            return;
        }

        if self
            .search_area
            .is_some_and(|area| rect_contains(area, column, row))
        {
            self.focus = Focus::Search;
            return;
        }

        let Some(card) = self
            .card_hits
            .iter()
            .find(|card| rect_contains(card.area, column, row))
            .copied()
        else {
            return;
        };

        self.focus = Focus::Grid;
        self.selected = card.index;
        if rect_contains(card.button, column, row) {
            self.open_card(card.index);
        }
    }

    fn modal_open(&self) -> bool {
        self.overlay.is_open() || self.help_modal.is_some()
    }

    fn move_selection(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let max = self.filtered.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, max) as usize;
    }

    /// Record the grid geometry of the current frame and scroll so the
    /// cursor row is visible.
    pub fn sync_viewport(&mut self, columns: usize, rows: usize) {
        self.grid_columns = columns.max(1);
        self.grid_rows = rows.max(1);

        let cursor_row = self.selected / self.grid_columns;
        if cursor_row < self.scroll_row {
            self.scroll_row = cursor_row;
        } else if cursor_row >= self.scroll_row + self.grid_rows {
            self.scroll_row = cursor_row + 1 - self.grid_rows;
        }

        let total_rows = self.filtered.len().div_ceil(self.grid_columns);
        let max_scroll = total_rows.saturating_sub(self.grid_rows);
        self.scroll_row = self.scroll_row.min(max_scroll);
    }

    /// Open the overlay on card `index` of the current filtered view.
    pub fn open_card(&mut self, index: usize) {
        if !self.overlay.open_at(&self.filtered, index) {
            return;
        }
        self.selected = index;
        self.overlay_hit = None;
        if let Some(record) = self.overlay_record() {
            tracing::debug!(country = record.common_name(), "overlay opened");
        }
        self.start_flag_fetch();
    }

    pub fn close_overlay(&mut self) {
        self.overlay.close();
        self.overlay_hit = None;
        self.flag_request = None;
        self.flag_error = None;
        self.set_flag(None);
    }

    fn start_flag_fetch(&mut self) {
        self.flag_request = None;
        self.flag_error = None;
        self.set_flag(None);

        let Some(key) = self.overlay.key() else {
            return;
        };
        let Some(client) = self.flag_client.clone() else {
            return;
        };
        let Some(url) = self
            .record(key)
            .and_then(CountryRecord::flag_url)
            .map(str::to_string)
        else {
            return;
        };
        self.flag_request = Some(FlagRequest::spawn(key, url, client));
    }

    fn set_flag(&mut self, flag: Option<FlagImage>) {
        match flag {
            Some(flag) => {
                let protocol = self.image_picker.new_resize_protocol(flag.image().clone());
                self.flag_state = Some(protocol);
                self.flag_data = Some(flag);
            }
            None => {
                self.flag_state = None;
                self.flag_data = None;
            }
        }
    }

    pub fn record(&self, key: CountryKey) -> Option<&CountryRecord> {
        self.countries.get(key.index())
    }

    pub fn filtered_record(&self, index: usize) -> Option<&CountryRecord> {
        self.filtered.get(index).and_then(|key| self.record(*key))
    }

    /// Record shown by the open overlay, looked up by key at render time.
    pub fn overlay_record(&self) -> Option<&CountryRecord> {
        self.overlay.key().and_then(|key| self.record(key))
    }

    pub fn flag_loading(&self) -> bool {
        self.flag_request.is_some()
    }

    pub fn flag_image_state(&mut self) -> Option<&mut Box<dyn StatefulProtocol>> {
        self.flag_state.as_mut()
    }

    pub fn image_font_size(&self) -> (u16, u16) {
        self.image_picker.font_size
    }

    pub fn empty_message(&self) -> String {
        match self.load_state {
            LoadState::Loading => "Loading countries...".to_string(),
            LoadState::Failed => "No countries loaded".to_string(),
            LoadState::Ready if self.countries.is_empty() => "No countries loaded".to_string(),
            LoadState::Ready => format!("No countries match \"{}\"", self.search_input.value()),
        }
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    // =========================================================================
    // Help Modal
    // =========================================================================

    /// Generate help content from current keybindings configuration
    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    HelpEntry {
                        action: "Quit",
                        keys: keys.global.quit.join(", "),
                    },
                    HelpEntry {
                        action: "Focus search",
                        keys: keys.global.search.join(", "),
                    },
                    HelpEntry {
                        action: "Help",
                        keys: keys.global.help.join(", "),
                    },
                ],
            },
            HelpSection {
                title: "Search",
                entries: vec![
                    HelpEntry {
                        action: "Back to grid",
                        keys: keys.search_input.cancel.join(", "),
                    },
                    HelpEntry {
                        action: "Browse results",
                        keys: keys.search_input.confirm.join(", "),
                    },
                ],
            },
            HelpSection {
                title: "Countries",
                entries: vec![
                    HelpEntry {
                        action: "Left / right",
                        keys: format!("{} / {}", keys.grid.left.join(", "), keys.grid.right.join(", ")),
                    },
                    HelpEntry {
                        action: "Up / down",
                        keys: format!("{} / {}", keys.grid.up.join(", "), keys.grid.down.join(", ")),
                    },
                    HelpEntry {
                        action: "Page up / down",
                        keys: format!(
                            "{} / {}",
                            keys.grid.page_up.join(", "),
                            keys.grid.page_down.join(", ")
                        ),
                    },
                    HelpEntry {
                        action: "Read more",
                        keys: keys.grid.open.join(", "),
                    },
                ],
            },
            HelpSection {
                title: "Details",
                entries: vec![
                    HelpEntry {
                        action: "Close",
                        keys: keys.overlay.close.join(", "),
                    },
                    HelpEntry {
                        action: "Close",
                        keys: "click outside".to_string(),
                    },
                ],
            },
        ]
    }

    fn help_total_lines(&self) -> usize {
        let sections = self.help_entries();
        let mut total = 0;
        for (idx, section) in sections.iter().enumerate() {
            total += 1 + section.entries.len();
            if idx < sections.len() - 1 {
                total += 1;
            }
        }
        total
    }

    pub fn show_help(&mut self) {
        let total_lines = self.help_total_lines();
        self.help_modal = Some(HelpModal::new(total_lines));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        let config = self.config;
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
            || key_matches_any(&key, &config.keys.global.help)
        {
            self.help_modal = None;
            return;
        }

        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_down(page);
            }
            KeyCode::PageUp => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_up(page);
            }
            _ => {}
        }
    }
}

/// Bindings that cannot be produced by typing text.
fn non_text_bindings(bindings: &[String]) -> Vec<String> {
    bindings
        .iter()
        .filter(|binding| binding.trim().chars().count() > 1)
        .cloned()
        .collect()
}

/// Check if the key event matches any of the bindings in the list
fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Disallow Ctrl/Alt/Super modifiers (we don't support them)
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if name.len() > 1 && name.starts_with('f') => name[1..]
            .parse::<u8>()
            .map(|n| (1..=12).contains(&n) && event.code == KeyCode::F(n))
            .unwrap_or(false),
        // Single character - case-sensitive (k != K, since K requires Shift)
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}
