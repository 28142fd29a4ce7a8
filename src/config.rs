//! Deployment-specific settings read from environment variables.

use std::{
    env::{self, VarError},
    path::PathBuf,
};

use anyhow::bail;

const ENV_WEBCAM_NAME: &str = "HANDSIGN_WEBCAM_NAME";
const ENV_NETWORK_DIR: &str = "HANDSIGN_NETWORK_DIR";
const ENV_HAND_NETWORK: &str = "HANDSIGN_HAND_NETWORK";
const ENV_JPEG_BACKEND: &str = "HANDSIGN_JPEG_BACKEND";

const DEFAULT_NETWORK_DIR: &str = "3rdparty/onnx";

/// Selects between the two sizes of the hand networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkVariant {
    /// Smaller and faster, less accurate.
    Lite,
    #[default]
    Full,
}

impl NetworkVariant {
    /// The file name suffix of this variant (`palm_detection_<suffix>.onnx`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Full => "full",
        }
    }
}

/// The JPEG decoders webcam frames can be decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a fast pure-Rust JPEG decoder.
    #[default]
    ZuneJpeg,
    /// Uses the `jpeg-decoder` crate (through `image`), a robust but slower pure-Rust decoder.
    JpegDecoder,
}

/// Settings that depend on the machine the programs run on, rather than on the task.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// V4L2 card name of the camera to open. `None` opens the first compatible device.
    pub webcam_name: Option<String>,
    /// Directory containing the ONNX hand networks.
    pub network_dir: PathBuf,
    pub network_variant: NetworkVariant,
    pub jpeg_backend: JpegBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webcam_name: None,
            network_dir: PathBuf::from(DEFAULT_NETWORK_DIR),
            network_variant: NetworkVariant::default(),
            jpeg_backend: JpegBackend::default(),
        }
    }
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut err = None;
        let settings = Self::from_lookup(|var| match env::var(var) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(s)) => {
                err.get_or_insert_with(|| {
                    anyhow::anyhow!(
                        "invalid value set for `{var}` variable: {}",
                        s.to_string_lossy()
                    )
                });
                None
            }
        });
        match err {
            Some(e) => Err(e),
            None => settings,
        }
    }

    /// Reads the settings through `lookup`, which maps a variable name to its value.
    ///
    /// Unset variables fall back to their defaults. Set but invalid values are reported as errors.
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Some(name) = lookup(ENV_WEBCAM_NAME) {
            log::debug!("webcam override: `{ENV_WEBCAM_NAME}` is set to '{name}'");
            settings.webcam_name = Some(name);
        }
        if let Some(dir) = lookup(ENV_NETWORK_DIR) {
            if dir.is_empty() {
                bail!(invalid(ENV_NETWORK_DIR, &dir));
            }
            settings.network_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup(ENV_HAND_NETWORK) {
            settings.network_variant = match &*v {
                "lite" => NetworkVariant::Lite,
                "full" => NetworkVariant::Full,
                _ => bail!(invalid(ENV_HAND_NETWORK, &v)),
            };
        }
        if let Some(v) = lookup(ENV_JPEG_BACKEND) {
            settings.jpeg_backend = match &*v {
                "zune-jpeg" => JpegBackend::ZuneJpeg,
                "jpeg-decoder" => JpegBackend::JpegDecoder,
                _ => bail!(invalid(ENV_JPEG_BACKEND, &v)),
            };
        }

        log::debug!("{settings:?}");
        Ok(settings)
    }
}

fn invalid(var: &str, value: &str) -> String {
    format!("invalid value set for `{var}` variable: '{value}'")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.network_dir, PathBuf::from("3rdparty/onnx"));
        assert_eq!(settings.network_variant, NetworkVariant::Full);
        assert_eq!(settings.jpeg_backend, JpegBackend::ZuneJpeg);
    }

    #[test]
    fn overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("HANDSIGN_WEBCAM_NAME", "HD Pro Webcam C920"),
            ("HANDSIGN_NETWORK_DIR", "/opt/nets"),
            ("HANDSIGN_HAND_NETWORK", "lite"),
            ("HANDSIGN_JPEG_BACKEND", "jpeg-decoder"),
        ]))
        .unwrap();
        assert_eq!(settings.webcam_name.as_deref(), Some("HD Pro Webcam C920"));
        assert_eq!(settings.network_dir, PathBuf::from("/opt/nets"));
        assert_eq!(settings.network_variant, NetworkVariant::Lite);
        assert_eq!(settings.jpeg_backend, JpegBackend::JpegDecoder);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = Settings::from_lookup(lookup(&[("HANDSIGN_HAND_NETWORK", "huge")])).unwrap_err();
        assert!(err.to_string().contains("HANDSIGN_HAND_NETWORK"));

        assert!(Settings::from_lookup(lookup(&[("HANDSIGN_JPEG_BACKEND", "mozjpeg")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("HANDSIGN_NETWORK_DIR", "")])).is_err());
    }
}
