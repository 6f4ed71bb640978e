use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod scene;
pub use scene::*;
mod validate;
pub use validate::*;
mod migration;
pub use migration::*;
mod commands;
pub use commands::*;
pub mod form;

pub const DEFAULT_RESOLUTION: &str = "1920x1080";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),
    #[error("malformed template: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scene index {index} out of bounds for {len} scenes")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
}

impl TemplateError {
    pub fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationIssue::new(location, message)])
    }

    /// True for errors caused by the document content rather than by editor usage.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Parse(_))
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A `WIDTHxHEIGHT` pair, used for the template resolution and image overlay scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("`{}` is not in WIDTHxHEIGHT form", s))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("`{}` has a non-numeric width", s))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("`{}` has a non-numeric height", s))?;
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Dimensions {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dimensions> for String {
    fn from(value: Dimensions) -> Self {
        value.to_string()
    }
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

/// The top-level video template document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            audio: None,
            scenes: Vec::new(),
        }
    }
}

impl Template {
    /// Migrates a raw document to the current schema and deserializes it.
    pub fn from_value(value: Value) -> Result<(Self, MigrationReport), TemplateError> {
        let (value, report) = migrate(value)?;
        let template = serde_json::from_value(value)?;
        Ok((template, report))
    }

    pub fn from_json_str(json: &str) -> Result<(Self, MigrationReport), TemplateError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn to_pretty_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn scene(&self, index: usize) -> Result<&Scene, TemplateError> {
        self.scenes.get(index).ok_or(TemplateError::IndexOutOfBounds {
            index,
            len: self.scenes.len(),
        })
    }

    /// Total running time of all scenes in seconds.
    pub fn total_duration(&self) -> u64 {
        self.scenes.iter().map(|s| s.duration as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_serializes_without_audio() {
        let json = serde_json::to_value(Template::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "resolution": "1920x1080", "scenes": [] })
        );
    }

    #[test]
    fn dimensions_parse_and_display() {
        let d: Dimensions = "1280x720".parse().unwrap();
        assert_eq!(d, Dimensions::new(1280, 720));
        assert_eq!(d.to_string(), "1280x720");
        assert!("1280".parse::<Dimensions>().is_err());
        assert!("axb".parse::<Dimensions>().is_err());
        assert!(!Dimensions::new(0, 10).is_positive());
    }

    #[test]
    fn scene_lookup_reports_bounds() {
        let template = Template::default();
        match template.scene(2) {
            Err(TemplateError::IndexOutOfBounds { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn total_duration_sums_scenes() {
        let mut template = Template::default();
        template.scenes.push(Scene::new(SceneType::Video, "a.mp4"));
        let mut b = Scene::new(SceneType::Image, "b.png");
        b.duration = 3;
        template.scenes.push(b);
        assert_eq!(template.total_duration(), 13);
    }
}
