use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use template::Template;
use tracing::{debug, info, warn};

use crate::{unique_generated_filename, validate_filename, StoreError, StoreResult};

/// Whole-document persistence keyed by filename. Last write wins.
pub trait TemplateStore: Send + Sync {
    /// Template filenames in ascending order.
    fn list(&self) -> StoreResult<Vec<String>>;

    fn read(&self, name: &str) -> StoreResult<Template>;

    /// Stores a new template under `requested`, or under a generated
    /// `template_<millis>.json` name, and returns the name used.
    fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String>;

    /// Replaces an existing template.
    fn update(&self, name: &str, template: &Template) -> StoreResult<()>;
}

/// One pretty-printed JSON file per template.
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!(path = %root.display(), "template store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }

    /// Writes a brand new file, failing with `AlreadyExists` instead of overwriting.
    fn write_new(&self, name: &str, body: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))?;
        file.write_all(body)?;
        file.sync_all()
    }
}

impl TemplateStore for FsTemplateStore {
    fn list(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_filename(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> StoreResult<Template> {
        let path = self.path_for(name)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let (template, report) =
            Template::from_json_str(&data).map_err(|source| StoreError::Corrupt {
                name: name.to_string(),
                source,
            })?;
        if !report.is_empty() {
            debug!(file = name, changes = report.changes.len(), "migrated legacy template");
        }
        Ok(template)
    }

    fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String> {
        template.validate()?;
        let body = template.to_pretty_json()?;

        if let Some(name) = requested {
            validate_filename(name)?;
            return match self.write_new(name, body.as_bytes()) {
                Ok(()) => {
                    info!(file = name, "template created");
                    Ok(name.to_string())
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    Err(StoreError::Conflict(name.to_string()))
                }
                Err(e) => Err(e.into()),
            };
        }

        loop {
            let name = unique_generated_filename(|n| self.root.join(n).exists());
            match self.write_new(&name, body.as_bytes()) {
                Ok(()) => {
                    info!(file = %name, "template created");
                    return Ok(name);
                }
                // Lost a race for the generated name; pick the next one.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(file = %name, "generated filename taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn update(&self, name: &str, template: &Template) -> StoreResult<()> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        template.validate()?;
        let body = template.to_pretty_json()?;

        let tmp = self.root.join(format!(".{}.tmp", name));
        fs::write(&tmp, body)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(file = name, "template updated");
        Ok(())
    }
}

/// In-process store with the same contract as [`FsTemplateStore`].
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<BTreeMap<String, Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn list(&self) -> StoreResult<Vec<String>> {
        Ok(self.templates.read().keys().cloned().collect())
    }

    fn read(&self, name: &str) -> StoreResult<Template> {
        validate_filename(name)?;
        self.templates
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String> {
        template.validate()?;
        let mut templates = self.templates.write();
        let name = match requested {
            Some(name) => {
                validate_filename(name)?;
                if templates.contains_key(name) {
                    return Err(StoreError::Conflict(name.to_string()));
                }
                name.to_string()
            }
            None => unique_generated_filename(|n| templates.contains_key(n)),
        };
        templates.insert(name.clone(), template.clone());
        debug!(file = %name, "template created in memory");
        Ok(name)
    }

    fn update(&self, name: &str, template: &Template) -> StoreResult<()> {
        validate_filename(name)?;
        template.validate()?;
        let mut templates = self.templates.write();
        match templates.get_mut(name) {
            Some(existing) => {
                *existing = template.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}
