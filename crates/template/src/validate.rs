use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Dimensions, Filter, ImageOverlay, Scene, Template, TemplateError, TextOverlay};

/// A single rule violation, located by a path such as `scenes[1].text[0].end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, location: String, message: impl Into<String>) {
        self.0.push(ValidationIssue::new(location, message));
    }

    fn check(&mut self, ok: bool, location: impl FnOnce() -> String, message: &str) {
        if !ok {
            self.push(location(), message);
        }
    }

    fn into_result(self) -> Result<(), TemplateError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::Validation(self.0))
        }
    }
}

pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

impl Template {
    /// Checks every document invariant, collecting all violations.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut issues = Issues::default();
        match self.resolution.parse::<Dimensions>() {
            Ok(d) if d.is_positive() => {}
            Ok(_) => issues.push(
                "resolution".to_string(),
                "width and height must be positive",
            ),
            Err(e) => issues.push("resolution".to_string(), e),
        }
        if let Some(audio) = &self.audio {
            issues.check(
                !audio.trim().is_empty(),
                || "audio".to_string(),
                "must not be blank when present",
            );
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            scene_issues(scene, &format!("scenes[{}]", i), &mut issues);
        }
        issues.into_result()
    }
}

impl Scene {
    pub fn validate(&self) -> Result<(), TemplateError> {
        self.validate_at("scene")
    }

    pub fn validate_at(&self, location: &str) -> Result<(), TemplateError> {
        let mut issues = Issues::default();
        scene_issues(self, location, &mut issues);
        issues.into_result()
    }
}

impl TextOverlay {
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut issues = Issues::default();
        text_issues(self, "text", &mut issues);
        issues.into_result()
    }
}

impl ImageOverlay {
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut issues = Issues::default();
        image_issues(self, "overlay", &mut issues);
        issues.into_result()
    }
}

fn scene_issues(scene: &Scene, at: &str, issues: &mut Issues) {
    issues.check(
        !scene.path.trim().is_empty(),
        || format!("{}.path", at),
        "a media file is required",
    );
    issues.check(
        scene.duration >= 1,
        || format!("{}.duration", at),
        "must be a positive number of seconds",
    );
    if let Some(Filter::ColorChannelMixer { settings }) = &scene.filter {
        for (name, value) in [("rr", settings.rr), ("gg", settings.gg), ("bb", settings.bb)] {
            issues.check(
                value.is_finite(),
                || format!("{}.filter.settings.{}", at, name),
                "must be a number",
            );
        }
    }
    for (i, text) in scene.text.iter().enumerate() {
        text_issues(text, &format!("{}.text[{}]", at, i), issues);
    }
    for (i, overlay) in scene.overlays.iter().enumerate() {
        image_issues(overlay, &format!("{}.overlays[{}]", at, i), issues);
    }
}

fn time_range_issues(start: f64, end: f64, at: &str, issues: &mut Issues) {
    issues.check(
        start.is_finite() && start >= 0.0,
        || format!("{}.start", at),
        "must be a non-negative number",
    );
    issues.check(
        end.is_finite() && end >= start,
        || format!("{}.end", at),
        "must not be before start",
    );
}

fn text_issues(text: &TextOverlay, at: &str, issues: &mut Issues) {
    time_range_issues(text.start, text.end, at, issues);
    for (name, value) in [("xPosition", text.x_position), ("yPosition", text.y_position)] {
        issues.check(
            (0.0..=100.0).contains(&value),
            || format!("{}.{}", at, name),
            "must be a percentage between 0 and 100",
        );
    }
    issues.check(
        text.font_size.is_finite() && text.font_size > 0.0,
        || format!("{}.fontSize", at),
        "must be positive",
    );
    issues.check(
        is_hex_color(&text.color),
        || format!("{}.color", at),
        "must be a hex color like #ffffff",
    );
    issues.check(
        is_hex_color(&text.box_color),
        || format!("{}.boxColor", at),
        "must be a hex color like #000000",
    );
    issues.check(
        (0.0..=1.0).contains(&text.box_opacity),
        || format!("{}.boxOpacity", at),
        "must be between 0 and 1",
    );
    issues.check(
        text.padding.is_finite() && text.padding >= 0.0,
        || format!("{}.padding", at),
        "must not be negative",
    );
}

fn image_issues(overlay: &ImageOverlay, at: &str, issues: &mut Issues) {
    issues.check(
        !overlay.path.trim().is_empty(),
        || format!("{}.path", at),
        "an image file is required",
    );
    issues.check(
        overlay.scale.is_positive(),
        || format!("{}.scale", at),
        "width and height must be positive",
    );
    time_range_issues(overlay.start, overlay.end, at, issues);
}
