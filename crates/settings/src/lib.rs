#![deny(warnings)]

//! Persisted last-used parameters for every tool, so a session can pick up
//! where the previous one stopped.

use chrono::{DateTime, Utc};
use postscript_core::{reshape::ChapterLength, Genre, HuntPlan, GENRE_COUNT};
use postscript_opt::OptimizeParams;
use postscript_sim::{batch::SIMULATOR_RUNS, dual::DUAL_RUNS, farm::FarmParams, reroll};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Current on-disk layout version.
pub const SETTINGS_VERSION: u32 = 1;
/// Overrides [`default_settings_path`].
pub const SETTINGS_ENV: &str = "POSTSCRIPT_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Returns the settings path used when none is given.
pub fn default_settings_path() -> PathBuf {
    match std::env::var_os(SETTINGS_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("./saves/settings.json"),
    }
}

fn zeros() -> Vec<u32> {
    vec![0; GENRE_COUNT]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub notoriety: Vec<u32>,
    pub pages: Vec<u32>,
    pub plan: HuntPlan,
    pub params: OptimizeParams,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            notoriety: zeros(),
            pages: vec![500; GENRE_COUNT],
            plan: HuntPlan::default(),
            params: OptimizeParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub notoriety: Vec<u32>,
    pub pages: Vec<u32>,
    pub plan: HuntPlan,
    pub runs: u32,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        SimulatorSettings {
            notoriety: zeros(),
            pages: zeros(),
            plan: HuntPlan::default(),
            runs: SIMULATOR_RUNS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupSettings {
    pub plan: HuntPlan,
    pub pages: Vec<u32>,
    pub auto_extend: bool,
}

impl Default for SetupSettings {
    fn default() -> Self {
        SetupSettings {
            plan: HuntPlan::default(),
            pages: zeros(),
            auto_extend: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualSettings {
    pub notoriety: Vec<u32>,
    pub setups: [SetupSettings; 2],
    pub runs: u32,
}

impl Default for DualSettings {
    fn default() -> Self {
        DualSettings {
            notoriety: zeros(),
            setups: [SetupSettings::default(), SetupSettings::default()],
            runs: DUAL_RUNS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerSettings {
    pub pages: Vec<u32>,
    pub percent: f64,
}

impl Default for ScalerSettings {
    fn default() -> Self {
        ScalerSettings {
            pages: zeros(),
            percent: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixerSettings {
    pub pages: Vec<u32>,
    pub genre: Genre,
    pub length: ChapterLength,
    pub share_percent: f64,
}

impl Default for FixerSettings {
    fn default() -> Self {
        FixerSettings {
            pages: zeros(),
            genre: Genre::Romance,
            length: ChapterLength::Ten,
            share_percent: 35.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerollSettings {
    pub genres: usize,
    pub iterations: u32,
}

impl Default for RerollSettings {
    fn default() -> Self {
        RerollSettings {
            genres: 5,
            iterations: reroll::DEFAULT_ITERATIONS,
        }
    }
}

/// Everything the tools remember between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub saved_at: Option<DateTime<Utc>>,
    pub optimizer: OptimizerSettings,
    pub simulator: SimulatorSettings,
    pub dual: DualSettings,
    pub dual_pruned: DualSettings,
    pub scaler: ScalerSettings,
    pub fixer: FixerSettings,
    pub farm: FarmParams,
    pub reroll: RerollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: SETTINGS_VERSION,
            saved_at: None,
            optimizer: OptimizerSettings::default(),
            simulator: SimulatorSettings::default(),
            dual: DualSettings::default(),
            dual_pruned: DualSettings::default(),
            scaler: ScalerSettings::default(),
            fixer: FixerSettings::default(),
            farm: FarmParams::default(),
            reroll: RerollSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings: Settings = match Format::of(path) {
            Format::Json => serde_json::from_str(&text)?,
            Format::Yaml => serde_yaml::from_str(&text)?,
        };
        if settings.version > SETTINGS_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_VERSION,
            });
        }
        Ok(settings)
    }

    /// Stamp `saved_at` and write atomically: a sibling temp file is written
    /// first and then renamed over `path`.
    pub fn save(&mut self, path: &Path) -> Result<(), SettingsError> {
        self.version = SETTINGS_VERSION;
        self.saved_at = Some(Utc::now());
        let text = match Format::of(path) {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Yaml => serde_yaml::to_string(self)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }
}
