use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Straight RGBA with channels in `0..=1`.
///
/// Written either as `"#rrggbb"` / `"#rrggbbaa"` or as a `[r, g, b, a]` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorValue(pub [f32; 4]);

impl ColorValue {
    pub const BLACK: ColorValue = ColorValue([0.0, 0.0, 0.0, 1.0]);

    pub fn parse_hex(raw: &str) -> Result<Self, String> {
        let digits = raw
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("color '{raw}' must start with '#'"))?;
        if !matches!(digits.len(), 6 | 8) || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!("color '{raw}' must be #rrggbb or #rrggbbaa"));
        }
        let mut channels = [0.0, 0.0, 0.0, 1.0];
        for (index, slot) in channels.iter_mut().enumerate().take(digits.len() / 2) {
            let byte = u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16)
                .map_err(|err| format!("color '{raw}': {err}"))?;
            *slot = f32::from(byte) / 255.0;
        }
        Ok(Self(channels))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8);
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl<'de> Deserialize<'de> for ColorValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            Rgb([f32; 3]),
            Rgba([f32; 4]),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) => ColorValue::parse_hex(&raw).map_err(de::Error::custom),
            Helper::Rgb([r, g, b]) => Ok(ColorValue([r, g, b, 1.0])),
            Helper::Rgba(channels) => Ok(ColorValue(channels)),
        }
    }
}

impl Serialize for ColorValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Sine,
    Noise,
    Ramp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Off,
    Samples2,
    Samples4,
    Samples8,
}

impl AntialiasSetting {
    pub fn samples(self) -> u32 {
        match self {
            Self::Off => 1,
            Self::Samples2 => 2,
            Self::Samples4 => 4,
            Self::Samples8 => 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    pub version: u32,
    #[serde(default)]
    pub log_y: bool,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub fill: FillSection,
    #[serde(default)]
    pub line: LineSection,
    #[serde(default)]
    pub marker: MarkerSection,
    #[serde(default)]
    pub signal: SignalSection,
    #[serde(default)]
    pub window: WindowSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSection {
    /// `[xmin, ymin, width, height]` in data units.
    pub rect: [f64; 4],
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            rect: [0.0, -1.5, 10.0, 3.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_fill_color")]
    pub color: ColorValue,
}

impl Default for FillSection {
    fn default() -> Self {
        Self {
            enabled: true,
            color: default_fill_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_line_width")]
    pub width: f64,
    #[serde(default = "default_color")]
    pub color: ColorValue,
}

impl Default for LineSection {
    fn default() -> Self {
        Self {
            enabled: true,
            width: default_line_width(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_marker_size")]
    pub size: f64,
    #[serde(default)]
    pub segments: u32,
    #[serde(default)]
    pub border: bool,
    #[serde(default = "default_color")]
    pub color: ColorValue,
}

impl Default for MarkerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            size: default_marker_size(),
            segments: 0,
            border: false,
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSection {
    #[serde(default = "default_signal_kind")]
    pub kind: SignalKind,
    #[serde(default = "default_points")]
    pub points: usize,
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
}

impl Default for SignalSection {
    fn default() -> Self {
        Self {
            kind: default_signal_kind(),
            points: default_points(),
            interval: default_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSection {
    /// Initial inner size in logical pixels.
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
}

fn enabled() -> bool {
    true
}

fn default_color() -> ColorValue {
    ColorValue::BLACK
}

fn default_fill_color() -> ColorValue {
    ColorValue([0.0, 0.0, 0.0, 0.25])
}

fn default_line_width() -> f64 {
    1.0
}

fn default_marker_size() -> f64 {
    5.0
}

fn default_signal_kind() -> SignalKind {
    SignalKind::Sine
}

fn default_points() -> usize {
    256
}

fn default_interval() -> Duration {
    Duration::from_millis(16)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must be non-negative"))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            Some(parse_antialias(&value.to_string()).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl PlotConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PlotConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let [x, y, width, height] = self.view.rect;
        if ![x, y, width, height].iter().all(|value| value.is_finite()) {
            return Err(ConfigError::Invalid(
                "view.rect values must be finite".into(),
            ));
        }
        if width == 0.0 || height == 0.0 {
            return Err(ConfigError::Invalid(
                "view.rect width and height must be non-zero".into(),
            ));
        }

        if !(self.line.width >= 0.0) {
            return Err(ConfigError::Invalid("line.width must be >= 0".into()));
        }
        if !(self.marker.size >= 0.0) {
            return Err(ConfigError::Invalid("marker.size must be >= 0".into()));
        }
        if matches!(self.marker.segments, 1 | 2) {
            return Err(ConfigError::Invalid(format!(
                "marker.segments is {}; use 0 for circles or at least 3 for polygons",
                self.marker.segments
            )));
        }

        for (name, color) in [
            ("fill.color", self.fill.color),
            ("line.color", self.line.color),
            ("marker.color", self.marker.color),
        ] {
            if !color.0.iter().all(|channel| (0.0..=1.0).contains(channel)) {
                return Err(ConfigError::Invalid(format!(
                    "{name} channels must lie within 0..=1"
                )));
            }
        }

        if self.signal.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "signal.interval must be greater than zero".into(),
            ));
        }

        if let Some(fps) = self.window.fps {
            if fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }
        if let Some([w, h]) = self.window.size {
            if w == 0 || h == 0 {
                return Err(ConfigError::Invalid(
                    "window.size must be non-zero in both dimensions".into(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            version: 1,
            log_y: false,
            view: ViewSection::default(),
            fill: FillSection::default(),
            line: LineSection::default(),
            marker: MarkerSection::default(),
            signal: SignalSection::default(),
            window: WindowSection::default(),
        }
    }
}
