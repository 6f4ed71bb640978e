//! Rewrites documents saved by older editor builds into the current schema.
//!
//! Older builds wrote `effect` for the scene filter, `imageOverlays` for image
//! overlays, `edit` for the editable flags, `boxPadding` for text padding,
//! separate `scaleWidth`/`scaleHeight` integers for overlay scale and `""` for
//! a missing audio track. `migrate` folds all of these into canonical keys in a
//! single pass. A canonical key that is already present always wins.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Dimensions, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationChange {
    pub location: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub changes: Vec<MigrationChange>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn record(&mut self, location: &str, description: impl Into<String>) {
        self.changes.push(MigrationChange {
            location: location.to_string(),
            description: description.into(),
        });
    }
}

/// Brings a raw template document up to the current schema.
///
/// Idempotent: migrating an already canonical document returns it unchanged
/// with an empty report.
pub fn migrate(mut value: Value) -> Result<(Value, MigrationReport), TemplateError> {
    let mut report = MigrationReport::default();
    let root = value
        .as_object_mut()
        .ok_or_else(|| TemplateError::invalid("template", "must be a JSON object"))?;

    if matches!(root.get("audio"), Some(Value::String(s)) if s.trim().is_empty())
        || matches!(root.get("audio"), Some(Value::Null))
    {
        root.remove("audio");
        report.record("audio", "dropped empty audio path");
    }

    if let Some(Value::Array(scenes)) = root.get_mut("scenes") {
        for (i, scene) in scenes.iter_mut().enumerate() {
            if let Value::Object(scene) = scene {
                migrate_scene(scene, &format!("scenes[{}]", i), &mut report);
            }
        }
    }

    Ok((value, report))
}

fn rename_key(
    obj: &mut Map<String, Value>,
    legacy: &str,
    canonical: &str,
    at: &str,
    report: &mut MigrationReport,
) {
    let Some(old) = obj.remove(legacy) else {
        return;
    };
    if obj.contains_key(canonical) {
        report.record(
            at,
            format!("dropped legacy `{}` shadowed by `{}`", legacy, canonical),
        );
    } else {
        obj.insert(canonical.to_string(), old);
        report.record(at, format!("renamed `{}` to `{}`", legacy, canonical));
    }
}

fn migrate_scene(scene: &mut Map<String, Value>, at: &str, report: &mut MigrationReport) {
    rename_key(scene, "effect", "filter", at, report);
    rename_key(scene, "imageOverlays", "overlays", at, report);
    rename_key(scene, "edit", "editable", at, report);

    // The old form stored the "None" choice literally.
    let filter_is_none = match scene.get("filter") {
        Some(Value::Object(filter)) => matches!(
            filter.get("type").and_then(Value::as_str),
            Some(t) if t.eq_ignore_ascii_case("none") || t.is_empty()
        ),
        _ => false,
    };
    if filter_is_none {
        scene.insert("filter".to_string(), Value::Null);
        report.record(at, "replaced `None` filter with null");
    }

    if let Some(Value::Array(texts)) = scene.get_mut("text") {
        for (i, text) in texts.iter_mut().enumerate() {
            if let Value::Object(text) = text {
                let here = format!("{}.text[{}]", at, i);
                rename_key(text, "edit", "editable", &here, report);
                rename_key(text, "boxPadding", "padding", &here, report);
            }
        }
    }

    if let Some(Value::Array(overlays)) = scene.get_mut("overlays") {
        for (i, overlay) in overlays.iter_mut().enumerate() {
            if let Value::Object(overlay) = overlay {
                migrate_overlay_scale(overlay, &format!("{}.overlays[{}]", at, i), report);
            }
        }
    }
}

fn migrate_overlay_scale(
    overlay: &mut Map<String, Value>,
    at: &str,
    report: &mut MigrationReport,
) {
    let width = overlay.remove("scaleWidth");
    let height = overlay.remove("scaleHeight");

    let scale_ok = matches!(
        overlay.get("scale"),
        Some(Value::String(s)) if s.parse::<Dimensions>().is_ok()
    );
    if scale_ok {
        if width.is_some() || height.is_some() {
            report.record(at, "dropped legacy `scaleWidth`/`scaleHeight` shadowed by `scale`");
        }
        return;
    }

    let as_u32 = |v: &Option<Value>| {
        v.as_ref()
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };
    let defaults = Dimensions::default();
    let dims = match (as_u32(&width), as_u32(&height)) {
        (Some(w), Some(h)) => {
            report.record(at, "combined `scaleWidth`/`scaleHeight` into `scale`");
            Dimensions::new(w, h)
        }
        _ if overlay.contains_key("scale") => {
            report.record(at, "replaced unparseable `scale` with the default size");
            defaults
        }
        _ if width.is_some() || height.is_some() => {
            report.record(
                at,
                "replaced incomplete `scaleWidth`/`scaleHeight` with the default size",
            );
            defaults
        }
        _ => return,
    };
    overlay.insert("scale".to_string(), Value::String(dims.to_string()));
}
