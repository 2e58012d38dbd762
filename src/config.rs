use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "countrydex";

pub const DEFAULT_ENDPOINT: &str = "https://restcountries.com/v3.1/all";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const MIN_CARD_WIDTH: u16 = 16;
const MIN_CARD_HEIGHT: u16 = 6;
const MAX_FLAG_HEIGHT: u16 = 40;

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub keys: Keys,
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            config_path: None,
            endpoint: file.endpoint,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            keys: file.keys.into(),
            ui: file.ui.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
    pub grid: UiGrid,
    pub overlay: UiOverlay,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
}

#[derive(Debug, Clone)]
pub struct UiGrid {
    pub card_width: u16,
    pub card_height: u16,
}

#[derive(Debug, Clone)]
pub struct UiOverlay {
    pub width: u16,
    pub flag_height: u16,
    /// Download and draw the flag PNG when the overlay opens
    pub flag_images: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// =============================================================================
// Key Bindings - Context-aware with multiple bindings per action
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone)]
pub struct Keys {
    /// Global keys (grid context, not while typing)
    pub global: GlobalKeys,
    /// Keys for the search input
    pub search_input: SearchInputKeys,
    /// Keys for moving through the card grid
    pub grid: GridKeys,
    /// Keys while the detail overlay is open
    pub overlay: OverlayKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub help: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchInputKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GridKeys {
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub page_up: Vec<String>,
    pub page_down: Vec<String>,
    pub open: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OverlayKeys {
    pub close: Vec<String>,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for Keys {
    fn default() -> Self {
        Self {
            global: GlobalKeys::default(),
            search_input: SearchInputKeys::default(),
            grid: GridKeys::default(),
            overlay: OverlayKeys::default(),
        }
    }
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: vec!["q".into()],
            search: vec!["/".into()],
            help: vec!["F1".into(), "?".into()],
        }
    }
}

impl Default for SearchInputKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            confirm: vec!["Enter".into(), "Down".into(), "Tab".into()],
        }
    }
}

impl Default for GridKeys {
    fn default() -> Self {
        Self {
            left: vec!["h".into(), "Left".into()],
            right: vec!["l".into(), "Right".into()],
            up: vec!["k".into(), "Up".into()],
            down: vec!["j".into(), "Down".into()],
            page_up: vec!["PageUp".into()],
            page_down: vec!["PageDown".into()],
            open: vec!["Enter".into(), "Space".into()],
        }
    }
}

impl Default for OverlayKeys {
    fn default() -> Self {
        Self {
            close: vec!["Escape".into(), "q".into()],
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    search_input: SearchInputKeysFile,
    grid: GridKeysFile,
    overlay: OverlayKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalKeysFile {
    quit: KeyBinding,
    search: KeyBinding,
    help: KeyBinding,
}

impl Default for GlobalKeysFile {
    fn default() -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            search: KeyBinding::Multiple(defaults.search),
            help: KeyBinding::Multiple(defaults.help),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchInputKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
}

impl Default for SearchInputKeysFile {
    fn default() -> Self {
        let defaults = SearchInputKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GridKeysFile {
    left: KeyBinding,
    right: KeyBinding,
    up: KeyBinding,
    down: KeyBinding,
    page_up: KeyBinding,
    page_down: KeyBinding,
    open: KeyBinding,
}

impl Default for GridKeysFile {
    fn default() -> Self {
        let defaults = GridKeys::default();
        Self {
            left: KeyBinding::Multiple(defaults.left),
            right: KeyBinding::Multiple(defaults.right),
            up: KeyBinding::Multiple(defaults.up),
            down: KeyBinding::Multiple(defaults.down),
            page_up: KeyBinding::Multiple(defaults.page_up),
            page_down: KeyBinding::Multiple(defaults.page_down),
            open: KeyBinding::Multiple(defaults.open),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OverlayKeysFile {
    close: KeyBinding,
}

impl Default for OverlayKeysFile {
    fn default() -> Self {
        Self {
            close: KeyBinding::Multiple(OverlayKeys::default().close),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: GlobalKeys {
                quit: file.global.quit.into_vec(),
                search: file.global.search.into_vec(),
                help: file.global.help.into_vec(),
            },
            search_input: SearchInputKeys {
                cancel: file.search_input.cancel.into_vec(),
                confirm: file.search_input.confirm.into_vec(),
            },
            grid: GridKeys {
                left: file.grid.left.into_vec(),
                right: file.grid.right.into_vec(),
                up: file.grid.up.into_vec(),
                down: file.grid.down.into_vec(),
                page_up: file.grid.page_up.into_vec(),
                page_down: file.grid.page_down.into_vec(),
                open: file.grid.open.into_vec(),
            },
            overlay: OverlayKeys {
                close: file.overlay.close.into_vec(),
            },
        }
    }
}

// =============================================================================
// Key binding validation
// =============================================================================

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case (since 'K' means Shift+k, different from 'k').
/// Multi-character key names are case-insensitive (Enter, ENTER, enter are the same).
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        match trimmed.to_ascii_lowercase().as_str() {
            "esc" => "escape".to_string(),
            "shift+tab" => "backtab".to_string(),
            "page_up" => "pageup".to_string(),
            "page_down" => "pagedown".to_string(),
            other => other.to_string(),
        }
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

/// Validate all key bindings for collisions within each context.
/// The grid context also receives the global keys, since both are live there.
fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("search", &keys.global.search),
            ("help", &keys.global.help),
            ("left", &keys.grid.left),
            ("right", &keys.grid.right),
            ("up", &keys.grid.up),
            ("down", &keys.grid.down),
            ("page_up", &keys.grid.page_up),
            ("page_down", &keys.grid.page_down),
            ("open", &keys.grid.open),
        ],
        "grid",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.search_input.cancel),
            ("confirm", &keys.search_input.confirm),
        ],
        "search_input",
    )?;

    if keys.overlay.close.iter().all(|key| key.trim().is_empty()) {
        bail!("[keys.overlay] close must have at least one binding");
    }

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    endpoint: String,
    request_timeout_secs: u64,
    keys: KeysFile,
    ui: UiFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            keys: KeysFile::default(),
            ui: UiFile::default(),
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration. An explicit path must exist; the default location is
/// optional and falls back to built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let mut config = parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.config_path = Some(path);
    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse(raw: &str) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse configuration as TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;

    let endpoint = cfg_file.endpoint.trim().to_string();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        bail!("`endpoint` must be an http(s) URL, got '{}'", endpoint);
    }

    if cfg_file.request_timeout_secs == 0 {
        bail!("`request_timeout_secs` must be greater than zero");
    }

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    Ok(Config {
        config_path: None,
        endpoint,
        request_timeout: Duration::from_secs(cfg_file.request_timeout_secs),
        keys,
        ui: cfg_file.ui.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in(table, "", &["endpoint", "request_timeout_secs", "keys", "ui"]);

    if let Some(keys) = table.get("keys").and_then(toml::Value::as_table) {
        warn_unknown_in(keys, "keys.", &["global", "search_input", "grid", "overlay"]);
        let contexts: [(&str, &[&str]); 4] = [
            ("global", &["quit", "search", "help"]),
            ("search_input", &["cancel", "confirm"]),
            (
                "grid",
                &["left", "right", "up", "down", "page_up", "page_down", "open"],
            ),
            ("overlay", &["close"]),
        ];
        for (context, known) in contexts {
            if let Some(section) = keys.get(context).and_then(toml::Value::as_table) {
                warn_unknown_in(section, &format!("keys.{context}."), known);
            }
        }
    }

    if let Some(ui) = table.get("ui").and_then(toml::Value::as_table) {
        warn_unknown_in(ui, "ui.", &["colors", "grid", "overlay"]);
        let sections: [(&str, &[&str]); 3] = [
            (
                "colors",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                ],
            ),
            ("grid", &["card_width", "card_height"]),
            ("overlay", &["width", "flag_height", "flag_images"]),
        ];
        for (name, known) in sections {
            if let Some(section) = ui.get(name).and_then(toml::Value::as_table) {
                warn_unknown_in(section, &format!("ui.{name}."), known);
            }
        }
    }
}

fn warn_unknown_in(table: &toml::value::Table, prefix: &str, known: &[&str]) {
    let known: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            tracing::warn!("unknown configuration key `{}{}`", prefix, key);
        }
    }
}

// =============================================================================
// UI config types
// =============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
    grid: UiGridFile,
    overlay: UiOverlayFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(147, 112, 219),
            selection_bg: RgbColor::new(147, 112, 219),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(186, 160, 240),
            status_fg: RgbColor::new(186, 160, 240),
            status_bg: RgbColor::new(0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiGridFile {
    card_width: u16,
    card_height: u16,
}

impl Default for UiGridFile {
    fn default() -> Self {
        Self {
            card_width: 30,
            card_height: MIN_CARD_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiOverlayFile {
    width: u16,
    flag_height: u16,
    flag_images: bool,
}

impl Default for UiOverlayFile {
    fn default() -> Self {
        Self {
            width: 64,
            flag_height: 10,
            flag_images: true,
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let overlay_defaults = UiOverlayFile::default();
        Self {
            colors: UiColors {
                border: file.colors.border,
                selection_bg: file.colors.selection_bg,
                selection_fg: file.colors.selection_fg,
                separator: file.colors.separator,
                status_fg: file.colors.status_fg,
                status_bg: file.colors.status_bg,
            },
            grid: UiGrid {
                card_width: file.grid.card_width.max(MIN_CARD_WIDTH),
                card_height: file.grid.card_height.max(MIN_CARD_HEIGHT),
            },
            overlay: UiOverlay {
                width: if file.overlay.width == 0 {
                    overlay_defaults.width
                } else {
                    file.overlay.width
                },
                flag_height: file.overlay.flag_height.min(MAX_FLAG_HEIGHT),
                flag_images: file.overlay.flag_images,
            },
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}
