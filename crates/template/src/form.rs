//! Raw user input for scenes and overlays.
//!
//! Numeric fields are kept as the strings the user typed so that a malformed
//! number is reported as a validation issue instead of silently becoming zero.

use std::fmt;
use std::str::FromStr;

use crate::{
    ChannelMix, Dimensions, Filter, ImageOverlay, Scene, SceneType, TemplateError, TextOverlay,
    Transition, ValidationIssue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChoice {
    None,
    ColorChannelMixer,
}

impl Default for FilterChoice {
    fn default() -> Self {
        Self::None
    }
}

impl FilterChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::ColorChannelMixer => "colorchannelmixer",
        }
    }
}

impl fmt::Display for FilterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "colorchannelmixer" => Ok(Self::ColorChannelMixer),
            other => Err(format!(
                "unsupported filter `{}`; only colorchannelmixer is available",
                other
            )),
        }
    }
}

struct FieldParser {
    prefix: &'static str,
    issues: Vec<ValidationIssue>,
}

impl FieldParser {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            issues: Vec::new(),
        }
    }

    fn parse<T: FromStr>(&mut self, field: &str, raw: &str, expected: &str) -> Option<T> {
        let raw = raw.trim();
        if raw.is_empty() {
            self.issues.push(ValidationIssue::new(
                format!("{}.{}", self.prefix, field),
                "is required",
            ));
            return None;
        }
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.issues.push(ValidationIssue::new(
                    format!("{}.{}", self.prefix, field),
                    format!("`{}` is not {}", raw, expected),
                ));
                None
            }
        }
    }

    fn finish(self) -> Result<(), TemplateError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::Validation(self.issues))
        }
    }
}

/// The scene add/edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneForm {
    pub kind: SceneType,
    pub path: String,
    pub duration: String,
    pub transition: Transition,
    pub filter: FilterChoice,
    pub rr: String,
    pub gg: String,
    pub bb: String,
    pub editable: bool,
    pub text: Vec<TextOverlay>,
    pub overlays: Vec<ImageOverlay>,
}

impl Default for SceneForm {
    fn default() -> Self {
        let mix = ChannelMix::default();
        Self {
            kind: SceneType::Video,
            path: String::new(),
            duration: Scene::DEFAULT_DURATION.to_string(),
            transition: Transition::Fade,
            filter: FilterChoice::None,
            rr: mix.rr.to_string(),
            gg: mix.gg.to_string(),
            bb: mix.bb.to_string(),
            editable: true,
            text: Vec::new(),
            overlays: Vec::new(),
        }
    }
}

impl SceneForm {
    pub fn from_scene(scene: &Scene) -> Self {
        let (filter, mix) = match &scene.filter {
            Some(Filter::ColorChannelMixer { settings }) => {
                (FilterChoice::ColorChannelMixer, *settings)
            }
            None => (FilterChoice::None, ChannelMix::default()),
        };
        Self {
            kind: scene.kind,
            path: scene.path.clone(),
            duration: scene.duration.to_string(),
            transition: scene.transition,
            filter,
            rr: mix.rr.to_string(),
            gg: mix.gg.to_string(),
            bb: mix.bb.to_string(),
            editable: scene.editable,
            text: scene.text.clone(),
            overlays: scene.overlays.clone(),
        }
    }

    /// Parses the form into a scene. Nothing is produced unless every field is valid.
    pub fn into_scene(self) -> Result<Scene, TemplateError> {
        let mut fields = FieldParser::new("scene");
        let duration = fields.parse::<u32>("duration", &self.duration, "a whole number");
        let filter = match self.filter {
            FilterChoice::None => None,
            FilterChoice::ColorChannelMixer => {
                let rr = fields.parse::<f64>("filter.settings.rr", &self.rr, "a number");
                let gg = fields.parse::<f64>("filter.settings.gg", &self.gg, "a number");
                let bb = fields.parse::<f64>("filter.settings.bb", &self.bb, "a number");
                match (rr, gg, bb) {
                    (Some(rr), Some(gg), Some(bb)) => Some(Filter::ColorChannelMixer {
                        settings: ChannelMix { rr, gg, bb },
                    }),
                    _ => None,
                }
            }
        };
        fields.finish()?;

        let scene = Scene {
            kind: self.kind,
            path: self.path.trim().to_string(),
            duration: duration.unwrap_or_default(),
            transition: self.transition,
            filter,
            editable: self.editable,
            text: self.text,
            overlays: self.overlays,
        };
        scene.validate()?;
        Ok(scene)
    }

    /// Parses a text overlay form and appends it, returning its index.
    pub fn add_text(&mut self, form: TextOverlayForm) -> Result<usize, TemplateError> {
        self.text.push(form.into_overlay()?);
        Ok(self.text.len() - 1)
    }

    pub fn update_text(&mut self, index: usize, form: TextOverlayForm) -> Result<(), TemplateError> {
        let slot = entry(&mut self.text, "text", index)?;
        *slot = form.into_overlay()?;
        Ok(())
    }

    pub fn remove_text(&mut self, index: usize) -> Result<TextOverlay, TemplateError> {
        entry(&mut self.text, "text", index)?;
        Ok(self.text.remove(index))
    }

    /// Parses an image overlay form and appends it, returning its index.
    pub fn add_overlay(&mut self, form: ImageOverlayForm) -> Result<usize, TemplateError> {
        self.overlays.push(form.into_overlay()?);
        Ok(self.overlays.len() - 1)
    }

    pub fn update_overlay(
        &mut self,
        index: usize,
        form: ImageOverlayForm,
    ) -> Result<(), TemplateError> {
        let slot = entry(&mut self.overlays, "overlays", index)?;
        *slot = form.into_overlay()?;
        Ok(())
    }

    pub fn remove_overlay(&mut self, index: usize) -> Result<ImageOverlay, TemplateError> {
        entry(&mut self.overlays, "overlays", index)?;
        Ok(self.overlays.remove(index))
    }
}

fn entry<'a, T>(items: &'a mut [T], field: &str, index: usize) -> Result<&'a mut T, TemplateError> {
    let len = items.len();
    items.get_mut(index).ok_or_else(|| {
        TemplateError::invalid(
            format!("scene.{}[{}]", field, index),
            format!("no such entry; the scene has {}", len),
        )
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlayForm {
    pub content: String,
    pub start: String,
    pub end: String,
    pub x_position: String,
    pub y_position: String,
    pub font_size: String,
    pub color: String,
    pub box_color: String,
    pub box_opacity: String,
    pub padding: String,
    pub editable: bool,
}

impl Default for TextOverlayForm {
    fn default() -> Self {
        Self::from_overlay(&TextOverlay::default())
    }
}

impl TextOverlayForm {
    pub fn from_overlay(text: &TextOverlay) -> Self {
        Self {
            content: text.content.clone(),
            start: text.start.to_string(),
            end: text.end.to_string(),
            x_position: text.x_position.to_string(),
            y_position: text.y_position.to_string(),
            font_size: text.font_size.to_string(),
            color: text.color.clone(),
            box_color: text.box_color.clone(),
            box_opacity: text.box_opacity.to_string(),
            padding: text.padding.to_string(),
            editable: text.editable,
        }
    }

    pub fn into_overlay(self) -> Result<TextOverlay, TemplateError> {
        let mut fields = FieldParser::new("text");
        let start = fields.parse::<f64>("start", &self.start, "a number");
        let end = fields.parse::<f64>("end", &self.end, "a number");
        let x = fields.parse::<f64>("xPosition", &self.x_position, "a number");
        let y = fields.parse::<f64>("yPosition", &self.y_position, "a number");
        let font_size = fields.parse::<f64>("fontSize", &self.font_size, "a number");
        let box_opacity = fields.parse::<f64>("boxOpacity", &self.box_opacity, "a number");
        let padding = fields.parse::<f64>("padding", &self.padding, "a number");
        fields.finish()?;

        let text = TextOverlay {
            content: self.content,
            start: start.unwrap_or_default(),
            end: end.unwrap_or_default(),
            x_position: x.unwrap_or_default(),
            y_position: y.unwrap_or_default(),
            font_size: font_size.unwrap_or_default(),
            color: self.color.trim().to_string(),
            box_color: self.box_color.trim().to_string(),
            box_opacity: box_opacity.unwrap_or_default(),
            padding: padding.unwrap_or_default(),
            editable: self.editable,
        };
        text.validate()?;
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlayForm {
    pub path: String,
    pub x_position: String,
    pub y_position: String,
    pub scale_width: String,
    pub scale_height: String,
    pub start: String,
    pub end: String,
}

impl Default for ImageOverlayForm {
    fn default() -> Self {
        Self::from_overlay(&ImageOverlay::default())
    }
}

impl ImageOverlayForm {
    pub fn from_overlay(overlay: &ImageOverlay) -> Self {
        Self {
            path: overlay.path.clone(),
            x_position: overlay.x_position.to_string(),
            y_position: overlay.y_position.to_string(),
            scale_width: overlay.scale.width.to_string(),
            scale_height: overlay.scale.height.to_string(),
            start: overlay.start.to_string(),
            end: overlay.end.to_string(),
        }
    }

    pub fn into_overlay(self) -> Result<ImageOverlay, TemplateError> {
        let mut fields = FieldParser::new("overlay");
        let x = fields.parse::<i32>("xPosition", &self.x_position, "a whole number");
        let y = fields.parse::<i32>("yPosition", &self.y_position, "a whole number");
        let w = fields.parse::<u32>("scale.width", &self.scale_width, "a whole number");
        let h = fields.parse::<u32>("scale.height", &self.scale_height, "a whole number");
        let start = fields.parse::<f64>("start", &self.start, "a number");
        let end = fields.parse::<f64>("end", &self.end, "a number");
        fields.finish()?;

        let overlay = ImageOverlay {
            path: self.path.trim().to_string(),
            x_position: x.unwrap_or_default(),
            y_position: y.unwrap_or_default(),
            scale: Dimensions::new(w.unwrap_or_default(), h.unwrap_or_default()),
            start: start.unwrap_or_default(),
            end: end.unwrap_or_default(),
        };
        overlay.validate()?;
        Ok(overlay)
    }
}
