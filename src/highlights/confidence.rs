use serde::{Deserialize, Serialize};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// How well a highlighted passage is known. Shown to users as red/amber/green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[serde(alias = "red")]
    Low,
    #[serde(alias = "amber")]
    Medium,
    #[serde(alias = "green")]
    High,
}

impl Confidence {
    pub const ALL: [Confidence; 3] = [Confidence::Low, Confidence::Medium, Confidence::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn color(&self) -> ColorToken {
        to_color(*self)
    }

    /// Accepts level names and their color names, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "red" => Some(Confidence::Low),
            "medium" | "amber" => Some(Confidence::Medium),
            "high" | "green" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// Color identity of a highlight. Persisted highlights must always map back to
/// the same token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorToken {
    Red,
    Amber,
    Green,
    #[default]
    Neutral,
}

impl ColorToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorToken::Red => "red",
            ColorToken::Amber => "amber",
            ColorToken::Green => "green",
            ColorToken::Neutral => "neutral",
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            ColorToken::Red => "#e5484d",
            ColorToken::Amber => "#f5a524",
            ColorToken::Green => "#30a46c",
            ColorToken::Neutral => "#8b8d98",
        }
    }
}

pub fn to_color(level: Confidence) -> ColorToken {
    match level {
        Confidence::Low => ColorToken::Red,
        Confidence::Medium => ColorToken::Amber,
        Confidence::High => ColorToken::Green,
    }
}

/// Color for an untyped confidence label coming from the UI or old data.
/// Unknown labels fall back to the default token.
pub fn color_for_label(raw: &str) -> ColorToken {
    match Confidence::parse(raw) {
        Some(level) => to_color(level),
        None => {
            log_warn!("Unknown confidence level {raw:?}; using default highlight color");
            ColorToken::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{captured_logs, LogCapture};

    #[test]
    fn levels_map_to_traffic_light_colors() {
        assert_eq!(to_color(Confidence::Low), ColorToken::Red);
        assert_eq!(to_color(Confidence::Medium), ColorToken::Amber);
        assert_eq!(to_color(Confidence::High), ColorToken::Green);
    }

    #[test]
    fn mapping_is_deterministic_and_silent() {
        let _capture = LogCapture::start();
        for level in Confidence::ALL {
            assert_eq!(level.color(), level.color());
            assert_eq!(to_color(level), level.color());
        }
        assert!(captured_logs().is_empty());
    }

    #[test]
    fn labels_accept_levels_and_colors() {
        assert_eq!(color_for_label("green"), ColorToken::Green);
        assert_eq!(color_for_label("HIGH"), ColorToken::Green);
        assert_eq!(color_for_label(" amber "), ColorToken::Amber);
        assert_eq!(color_for_label("low"), ColorToken::Red);
    }

    #[test]
    fn unknown_label_falls_back_and_warns() {
        let _capture = LogCapture::start();
        assert_eq!(color_for_label("purple"), ColorToken::Neutral);

        let logs = captured_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, log::Level::Warn);
        assert!(logs[0].message.contains("purple"));
    }

    #[test]
    fn serde_uses_level_names_with_color_aliases() {
        assert_eq!(serde_json::to_string(&Confidence::Medium).unwrap(), "\"medium\"");
        let parsed: Confidence = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(parsed, Confidence::High);
        assert_eq!(serde_json::to_string(&ColorToken::Green).unwrap(), "\"green\"");
    }
}
