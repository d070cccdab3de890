//! Settings management for filter-cam
//!
//! Handles loading of the JSON files in the configuration directory:
//! `camera.json` (capture and output device) and `gui.json` (control panel
//! layout). A missing file is created as `{}` and read back as defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::effects::EffectArgs;

/// Which capture source to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraId {
    /// Native camera by index
    Index(u32),
    /// Generated test pattern
    Synthetic,
}

impl Default for CameraId {
    fn default() -> Self {
        CameraId::Index(0)
    }
}

impl<'de> Deserialize<'de> for CameraId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CameraIdHelper {
            Index(u32),
            Name(String),
        }

        match CameraIdHelper::deserialize(deserializer)? {
            CameraIdHelper::Index(i) => Ok(CameraId::Index(i)),
            CameraIdHelper::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl std::str::FromStr for CameraId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("synthetic") {
            return Ok(CameraId::Synthetic);
        }
        s.trim()
            .parse()
            .map(CameraId::Index)
            .map_err(|_| format!("unknown camera `{s}`, expected an index or \"synthetic\""))
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_frame_rate() -> f64 {
    30.0
}

/// Contents of `camera.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Capture source
    #[serde(alias = "camera")]
    pub camera_id: CameraId,
    /// Requested capture width
    #[serde(default = "default_width")]
    pub width: u32,
    /// Requested capture height
    #[serde(default = "default_height")]
    pub height: u32,
    /// Requested capture rate (the source may pick another)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Loopback device node to write frames to; `None` discards output
    pub output: Option<PathBuf>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            camera_id: CameraId::default(),
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            output: None,
        }
    }
}

/// Where the preview sits relative to the buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewPosition {
    #[serde(alias = "up", alias = "u", alias = "t", alias = "UP", alias = "TOP")]
    Top,
    #[default]
    #[serde(alias = "down", alias = "d", alias = "b", alias = "DOWN", alias = "BOTTOM")]
    Bottom,
    #[serde(alias = "l", alias = "LEFT")]
    Left,
    #[serde(alias = "r", alias = "RIGHT")]
    Right,
}

/// Preview section of `gui.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub enabled: bool,
    /// Mirror the preview copy (never the device output)
    pub mirrored: bool,
    /// Rounded preview corners
    pub round: bool,
    pub position: PreviewPosition,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mirrored: true,
            round: false,
            position: PreviewPosition::default(),
        }
    }
}

/// Hotkey binding of a button
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Hotkey {
    /// One key that toggles
    Single(String),
    /// Several keys that all toggle
    Many(Vec<String>),
    /// Keys that switch on (`true`), off (`false`) or toggle (anything else)
    Fixed(serde_json::Map<String, Value>),
}

/// What pressing a bound key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Toggle,
    On,
    Off,
}

impl Hotkey {
    /// Every key with its action
    pub fn bindings(&self) -> Vec<(String, KeyAction)> {
        match self {
            Hotkey::Single(key) => vec![(key.clone(), KeyAction::Toggle)],
            Hotkey::Many(keys) => keys.iter().map(|k| (k.clone(), KeyAction::Toggle)).collect(),
            Hotkey::Fixed(map) => map
                .iter()
                .map(|(key, value)| {
                    let action = match value {
                        Value::Bool(true) => KeyAction::On,
                        Value::Bool(false) => KeyAction::Off,
                        _ => KeyAction::Toggle,
                    };
                    (key.clone(), action)
                })
                .collect(),
        }
    }
}

/// One button of the layout
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ButtonSpec {
    /// Effect type; missing or starting with `_` disables the button
    #[serde(default)]
    pub filter: Option<String>,
    /// Caption, defaults to the effect type
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: EffectArgs,
    /// State the button returns to on reset
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hotkey: Option<Hotkey>,
}

impl ButtonSpec {
    /// Effect type, if this button is active in the layout
    pub fn effect_type(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .filter(|name| !name.is_empty() && !name.starts_with('_'))
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.filter.as_deref())
            .unwrap_or_default()
    }
}

/// One grid cell: a button, or a plain caption
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LayoutCell {
    Button(ButtonSpec),
    Label(String),
    Other(Value),
}

fn default_title() -> String {
    "filter-cam".to_string()
}

/// Contents of `gui.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanelLayout {
    #[serde(default = "default_title")]
    pub title: String,
    pub preview: PreviewSettings,
    /// Rows of cells
    pub buttons: Vec<Vec<LayoutCell>>,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            title: default_title(),
            preview: PreviewSettings::default(),
            buttons: Vec::new(),
        }
    }
}

impl PanelLayout {
    /// Buttons that map to an effect, in row-major order
    pub fn active_buttons(&self) -> impl Iterator<Item = &ButtonSpec> {
        self.buttons.iter().flatten().filter_map(|cell| match cell {
            LayoutCell::Button(spec) if spec.effect_type().is_some() => Some(spec),
            _ => None,
        })
    }
}

/// Errors that can occur while reading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error in {}: {source}", path.display())]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read `<dir>/<name>.json`, creating it as `{}` if it does not exist
pub fn load_config<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, SettingsError> {
    let path = dir.join(format!("{name}.json"));
    let io_err = |source| SettingsError::Io {
        path: path.clone(),
        source,
    };

    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("{} not found, creating an empty one", path.display());
            fs::create_dir_all(dir).map_err(io_err)?;
            fs::write(&path, "{}").map_err(io_err)?;
            "{}".to_string()
        }
        Err(e) => return Err(io_err(e)),
    };

    serde_json::from_str(&contents).map_err(|source| SettingsError::JsonParse {
        path: path.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_created() {
        let dir = tempfile::tempdir().unwrap();
        let settings: CameraSettings = load_config(dir.path(), "camera").unwrap();
        assert_eq!(settings, CameraSettings::default());

        let written = fs::read_to_string(dir.path().join("camera.json")).unwrap();
        assert_eq!(written, "{}");
    }

    #[test]
    fn test_camera_settings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("camera.json"),
            r#"{"camera_id": 2, "width": 1280, "output": "/dev/video9"}"#,
        )
        .unwrap();
        let settings: CameraSettings = load_config(dir.path(), "camera").unwrap();
        assert_eq!(settings.camera_id, CameraId::Index(2));
        assert_eq!(settings.width, 1280);
        assert_eq!(settings.height, 480);
        assert_eq!(settings.output, Some(PathBuf::from("/dev/video9")));

        let settings: CameraSettings = serde_json::from_value(json!({"camera": "synthetic"})).unwrap();
        assert_eq!(settings.camera_id, CameraId::Synthetic);
        assert!(serde_json::from_value::<CameraSettings>(json!({"camera_id": "front"})).is_err());
    }

    #[test]
    fn test_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gui.json"), "{").unwrap();
        assert!(matches!(
            load_config::<PanelLayout>(dir.path(), "gui"),
            Err(SettingsError::JsonParse { .. })
        ));
    }

    #[test]
    fn test_layout_parse() {
        let layout: PanelLayout = serde_json::from_value(json!({
            "title": "Cam",
            "preview": {"enabled": true, "mirrored": false, "round": true, "position": "left"},
            "buttons": [
                [
                    {"filter": "MirrorX", "hotkey": "m", "enabled": true},
                    "Caption",
                    {"filter": "_Blur", "args": {"blur_k": 3}},
                    {"name": "Nothing"}
                ],
                [{"filter": "Pixelized", "name": "Pixels", "args": [4, 0], "hotkey": ["p", "o"]}]
            ]
        }))
        .unwrap();

        assert_eq!(layout.title, "Cam");
        assert_eq!(layout.preview.position, PreviewPosition::Left);
        assert!(layout.preview.round);
        assert!(matches!(layout.buttons[0][1], LayoutCell::Label(_)));

        let active: Vec<_> = layout.active_buttons().map(|b| b.label().to_string()).collect();
        assert_eq!(active, vec!["MirrorX", "Pixels"]);
    }

    #[test]
    fn test_preview_position_aliases() {
        for (text, expected) in [
            ("up", PreviewPosition::Top),
            ("t", PreviewPosition::Top),
            ("bottom", PreviewPosition::Bottom),
            ("d", PreviewPosition::Bottom),
            ("r", PreviewPosition::Right),
        ] {
            let preview: PreviewSettings = serde_json::from_value(json!({"position": text})).unwrap();
            assert_eq!(preview.position, expected);
        }
        assert!(serde_json::from_value::<PreviewSettings>(json!({"position": "middle"})).is_err());
    }

    #[test]
    fn test_hotkey_bindings() {
        let hotkey: Hotkey = serde_json::from_value(json!({"a": true, "b": false, "c": 1})).unwrap();
        let mut bindings = hotkey.bindings();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            bindings,
            vec![
                ("a".to_string(), KeyAction::On),
                ("b".to_string(), KeyAction::Off),
                ("c".to_string(), KeyAction::Toggle),
            ]
        );

        let hotkey: Hotkey = serde_json::from_value(json!(["x", "y"])).unwrap();
        assert_eq!(hotkey.bindings().len(), 2);
    }
}
