use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Dimensions;

/// Kind of media a scene shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    Video,
    Image,
}

impl Default for SceneType {
    fn default() -> Self {
        Self::Video
    }
}

impl SceneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown scene type `{}`", other)),
        }
    }
}

/// Transition played when entering a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    CircleClose,
    WipeLeft,
    WipeRight,
    SlideUp,
    SlideDown,
}

impl Default for Transition {
    fn default() -> Self {
        Self::Fade
    }
}

impl Transition {
    pub fn all() -> [Self; 6] {
        [
            Self::Fade,
            Self::CircleClose,
            Self::WipeLeft,
            Self::WipeRight,
            Self::SlideUp,
            Self::SlideDown,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::CircleClose => "circleclose",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
            Self::SlideUp => "slideup",
            Self::SlideDown => "slidedown",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown transition `{}`", s.trim()))
    }
}

/// Per-channel gains for the `colorchannelmixer` filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMix {
    pub rr: f64,
    pub gg: f64,
    pub bb: f64,
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self {
            rr: 1.0,
            gg: 1.0,
            bb: 1.0,
        }
    }
}

/// Color adjustment applied to a whole scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Filter {
    #[serde(rename = "colorchannelmixer")]
    ColorChannelMixer { settings: ChannelMix },
}

impl Filter {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ColorChannelMixer { .. } => "colorchannelmixer",
        }
    }
}

fn default_true() -> bool {
    true
}

/// One ordered unit of media, timing and effects within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(rename = "type")]
    pub kind: SceneType,
    pub path: String,
    pub duration: u32,
    pub transition: Transition,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub text: Vec<TextOverlay>,
    #[serde(default)]
    pub overlays: Vec<ImageOverlay>,
}

impl Scene {
    pub const DEFAULT_DURATION: u32 = 10;

    pub fn new(kind: SceneType, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            duration: Self::DEFAULT_DURATION,
            transition: Transition::default(),
            filter: None,
            editable: true,
            text: Vec::new(),
            overlays: Vec::new(),
        }
    }
}

/// Text drawn over a scene between `start` and `end` seconds.
///
/// Positions are percentages of the frame; colors are `#rgb`/`#rrggbb` hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOverlay {
    pub content: String,
    pub start: f64,
    pub end: f64,
    pub x_position: f64,
    pub y_position: f64,
    pub font_size: f64,
    pub color: String,
    pub box_color: String,
    pub box_opacity: f64,
    pub padding: f64,
    pub editable: bool,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            content: String::new(),
            start: 0.0,
            end: 5.0,
            x_position: 50.0,
            y_position: 50.0,
            font_size: 24.0,
            color: "#ffffff".to_string(),
            box_color: "#000000".to_string(),
            box_opacity: 0.0,
            padding: 0.0,
            editable: false,
        }
    }
}

/// Image (or GIF) drawn over a scene, positioned in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOverlay {
    pub path: String,
    pub x_position: i32,
    pub y_position: i32,
    pub scale: Dimensions,
    pub start: f64,
    pub end: f64,
}

impl Default for ImageOverlay {
    fn default() -> Self {
        Self {
            path: String::new(),
            x_position: 10,
            y_position: 10,
            scale: Dimensions::default(),
            start: 0.0,
            end: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_kind_name_matches_wire_tag() {
        let filter = Filter::ColorChannelMixer {
            settings: ChannelMix::default(),
        };
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["type"], filter.kind_name());
    }

    #[test]
    fn scene_serializes_with_canonical_keys() {
        let mut scene = Scene::new(SceneType::Video, "uploads/a.mp4");
        scene.filter = Some(Filter::ColorChannelMixer {
            settings: ChannelMix {
                rr: 1.2,
                gg: 1.0,
                bb: 0.8,
            },
        });
        scene.overlays.push(ImageOverlay::default());

        let value = serde_json::to_value(&scene).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["transition"], "fade");
        assert_eq!(value["filter"]["type"], "colorchannelmixer");
        assert_eq!(value["filter"]["settings"]["bb"], 0.8);
        assert_eq!(value["editable"], true);
        assert_eq!(value["overlays"][0]["scale"], "1920x1080");
        assert_eq!(value["overlays"][0]["xPosition"], 10);
    }

    #[test]
    fn scene_without_filter_writes_null() {
        let value = serde_json::to_value(Scene::new(SceneType::Image, "x.png")).unwrap();
        assert!(value["filter"].is_null());
    }

    #[test]
    fn optional_collections_default_when_missing() {
        let scene: Scene = serde_json::from_value(json!({
            "type": "image",
            "path": "b.png",
            "duration": 4,
            "transition": "wipeleft"
        }))
        .unwrap();
        assert_eq!(scene.transition, Transition::WipeLeft);
        assert!(scene.editable);
        assert!(scene.text.is_empty());
        assert!(scene.overlays.is_empty());
        assert!(scene.filter.is_none());
    }

    #[test]
    fn filter_requires_all_channels() {
        let result = serde_json::from_value::<Filter>(json!({
            "type": "colorchannelmixer",
            "settings": { "rr": 1.0, "gg": 1.0 }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn text_overlay_fills_missing_fields() {
        let text: TextOverlay =
            serde_json::from_value(json!({ "content": "Hello", "end": 3 })).unwrap();
        assert_eq!(text.content, "Hello");
        assert_eq!(text.end, 3.0);
        assert_eq!(text.font_size, 24.0);
        assert_eq!(text.color, "#ffffff");
        assert!(!text.editable);
    }

    #[test]
    fn transition_round_trips_through_str() {
        for t in Transition::all() {
            assert_eq!(t.as_str().parse::<Transition>().unwrap(), t);
        }
        assert!("dissolve".parse::<Transition>().is_err());
    }
}
