use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub temp: TempConfig,
}

#[derive(Debug, Deserialize)]
pub struct CodecConfig {
    /// ffmpeg executable, looked up on PATH when not absolute
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct TempConfig {
    /// Directory for decoded PCM; the system temp dir when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

pub fn default_ffmpeg() -> PathBuf { "ffmpeg".into() }
pub fn default_width() -> usize { 800 }
pub fn default_height() -> usize { 120 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path, or the first of `subwave.toml`, `~/.config/subwave/config.toml`
/// and the platform config dir that exists.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("subwave.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("subwave").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("subwave").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.codec.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(config.display.width, 800);
        assert_eq!(config.display.height, 120);
        assert!(config.temp.dir.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            "[codec]\nffmpeg = \"/opt/ffmpeg/bin/ffmpeg\"\n\n[display]\nwidth = 1200\n",
        )
        .unwrap();
        assert_eq!(config.codec.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.display.width, 1200);
        assert_eq!(config.display.height, 120);
    }

    #[test]
    fn load_config_reads_file_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("config.toml");
        std::fs::write(&good, "[temp]\ndir = \"/var/tmp/subwave\"\n").unwrap();
        let config = load_config(&good).unwrap();
        assert_eq!(config.temp.dir, Some(PathBuf::from("/var/tmp/subwave")));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[display]\nwidth = \"wide\"\n").unwrap();
        assert!(load_config(&bad).is_none());
        assert!(load_config(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/etc/subwave.toml");
        assert_eq!(find_config_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
