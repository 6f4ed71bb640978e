use storage::{StoreError, StoredMedia, UploadMetadata};
use template::form::{ImageOverlayForm, SceneForm};
use template::{CommandHistory, Dimensions, Scene, Template, TemplateCommand, TemplateError};
use tracing::{debug, error, warn};

use crate::{EditorError, EditorResult, Notice, NoticeLevel, ProgressFn, TemplateBackend};

/// Where the document came from, which decides what `save` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Persisted under this filename; saving overwrites it.
    Stored(String),
    /// Started with "create new"; `previous` is the file to return to on cancel.
    New { previous: Option<String> },
    /// Blank document substituted for a template that could not be found.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewTarget {
    Scene(usize),
    Template,
}

/// Mutually exclusive sub-modes of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Idle,
    EditingScene(usize),
    AddingScene,
    Previewing(PreviewTarget),
}

impl Default for EditMode {
    fn default() -> Self {
        Self::Idle
    }
}

impl EditMode {
    fn scene_index(&self) -> Option<usize> {
        match self {
            Self::EditingScene(i) | Self::Previewing(PreviewTarget::Scene(i)) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    template: Template,
    origin: Origin,
    mode: EditMode,
    selection: Option<usize>,
    history: CommandHistory,
    dirty: bool,
}

impl Document {
    fn new(template: Template, origin: Origin) -> Self {
        Self {
            template,
            origin,
            mode: EditMode::Idle,
            selection: None,
            history: CommandHistory::default(),
            dirty: false,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The filename saves go to, if the document has been persisted.
    pub fn filename(&self) -> Option<&str> {
        match &self.origin {
            Origin::Stored(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self.origin, Origin::New { .. })
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn apply(&mut self, command: TemplateCommand) -> Result<(), TemplateError> {
        let reindexes = command.reindexes();
        self.history.apply(&mut self.template, command)?;
        self.after_change(reindexes);
        Ok(())
    }

    fn after_change(&mut self, reindexes: bool) {
        self.dirty = true;
        if reindexes {
            self.selection = None;
            if self.mode.scene_index().is_some() {
                self.mode = EditMode::Idle;
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<(), TemplateError> {
        self.template.scene(index).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub enum EditorState {
    NoTemplate,
    /// A read is in flight for this filename.
    Loading(String),
    Loaded(Document),
}

/// The single-document editing session.
pub struct Editor {
    backend: Box<dyn TemplateBackend>,
    state: EditorState,
    templates: Vec<String>,
    notices: Vec<Notice>,
}

impl Editor {
    pub fn new(backend: Box<dyn TemplateBackend>) -> Self {
        Self {
            backend,
            state: EditorState::NoTemplate,
            templates: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn document(&self) -> Option<&Document> {
        match &self.state {
            EditorState::Loaded(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn template(&self) -> Option<&Template> {
        self.document().map(Document::template)
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => error!(notice = %message),
            _ => debug!(notice = %message),
        }
        self.notices.push(Notice { level, message });
    }

    fn fail(&mut self, err: EditorError) -> EditorError {
        self.notify(NoticeLevel::Error, err.to_string());
        err
    }

    fn doc(&self) -> EditorResult<&Document> {
        self.document().ok_or(EditorError::NoTemplate)
    }

    fn doc_mut(&mut self) -> EditorResult<&mut Document> {
        match &mut self.state {
            EditorState::Loaded(doc) => Ok(doc),
            _ => Err(EditorError::NoTemplate),
        }
    }

    /// Runs `f` against the loaded document, reporting failures as notices.
    fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Document) -> Result<T, TemplateError>,
    ) -> EditorResult<T> {
        let result = match self.doc_mut() {
            Ok(doc) => f(doc).map_err(EditorError::from),
            Err(e) => Err(e),
        };
        result.map_err(|e| self.fail(e))
    }

    pub async fn refresh_list(&mut self) -> EditorResult<()> {
        match self.backend.list().await {
            Ok(names) => {
                debug!(count = names.len(), "template list refreshed");
                self.templates = names;
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Loads `name`. A missing template falls back to a blank, unsaved document;
    /// any other failure leaves the editor as it was.
    pub async fn load(&mut self, name: &str) -> EditorResult<()> {
        let previous = std::mem::replace(&mut self.state, EditorState::Loading(name.to_string()));
        match self.backend.read(name).await {
            Ok(template) => {
                self.state = EditorState::Loaded(Document::new(
                    template,
                    Origin::Stored(name.to_string()),
                ));
                self.notify(NoticeLevel::Info, format!("Loaded {}", name));
                Ok(())
            }
            Err(StoreError::NotFound(missing)) => {
                warn!(file = %missing, "template missing, falling back to a blank document");
                self.state =
                    EditorState::Loaded(Document::new(Template::default(), Origin::Fallback));
                Err(self.fail(StoreError::NotFound(missing).into()))
            }
            Err(e) => {
                self.state = previous;
                Err(self.fail(e.into()))
            }
        }
    }

    /// Starts a blank template, remembering the loaded file for `cancel_new`.
    pub fn create_new(&mut self) {
        let previous = match &self.state {
            EditorState::Loaded(doc) => match &doc.origin {
                Origin::Stored(name) => Some(name.clone()),
                Origin::New { previous } => previous.clone(),
                Origin::Fallback => None,
            },
            _ => None,
        };
        debug!(previous = ?previous, "creating new template");
        self.state = EditorState::Loaded(Document::new(
            Template::default(),
            Origin::New { previous },
        ));
    }

    /// Abandons a new template: reloads the file that was open before, or closes.
    pub async fn cancel_new(&mut self) -> EditorResult<()> {
        let previous = match &self.doc()?.origin {
            Origin::New { previous } => previous.clone(),
            _ => {
                return Err(self.fail(EditorError::InvalidMode("not creating a new template")))
            }
        };
        match previous {
            Some(name) => self.load(&name).await,
            None => {
                self.state = EditorState::NoTemplate;
                self.notify(NoticeLevel::Info, "New template discarded");
                Ok(())
            }
        }
    }

    /// Saves the document: overwrites its file if it has one, otherwise creates a new one.
    pub async fn save(&mut self) -> EditorResult<String> {
        self.persist(None).await
    }

    /// Creates a new file named `name` from the document and switches to it.
    pub async fn save_as(&mut self, name: &str) -> EditorResult<String> {
        self.persist(Some(name)).await
    }

    async fn persist(&mut self, requested: Option<&str>) -> EditorResult<String> {
        let (template, target) = {
            let doc = self.doc()?;
            let target = match (&doc.origin, requested) {
                (Origin::Stored(name), None) => Some(name.clone()),
                _ => None,
            };
            (doc.template.clone(), target)
        };
        if let Err(e) = template.validate() {
            return Err(self.fail(e.into()));
        }

        let result = match &target {
            Some(name) => self
                .backend
                .update(name, &template)
                .await
                .map(|_| name.clone()),
            None => self.backend.create(&template, requested).await,
        };
        let name = match result {
            Ok(name) => name,
            Err(e) => return Err(self.fail(e.into())),
        };

        let doc = self.doc_mut()?;
        doc.origin = Origin::Stored(name.clone());
        doc.dirty = false;
        if target.is_some() {
            self.notify(NoticeLevel::Success, format!("Updated {}", name));
        } else {
            self.notify(NoticeLevel::Success, format!("Saved new template as {}", name));
            if let Err(e) = self.refresh_list().await {
                warn!(error = %e, "template list refresh after create failed");
            }
        }
        Ok(name)
    }

    pub fn select_scene(&mut self, index: usize) -> EditorResult<()> {
        self.edit(|doc| {
            doc.check_index(index)?;
            doc.selection = Some(index);
            doc.mode = EditMode::Idle;
            Ok(())
        })
    }

    pub fn clear_selection(&mut self) -> EditorResult<()> {
        self.doc_mut()?.selection = None;
        Ok(())
    }

    pub fn begin_add_scene(&mut self) -> EditorResult<()> {
        let doc = self.doc_mut()?;
        doc.mode = EditMode::AddingScene;
        doc.selection = None;
        Ok(())
    }

    /// Enters scene editing and returns a form pre-filled from the scene.
    pub fn begin_edit_scene(&mut self, index: usize) -> EditorResult<SceneForm> {
        self.edit(|doc| {
            let form = SceneForm::from_scene(doc.template.scene(index)?);
            doc.mode = EditMode::EditingScene(index);
            doc.selection = None;
            Ok(form)
        })
    }

    /// Leaves whatever sub-mode is active.
    pub fn finish_mode(&mut self) -> EditorResult<()> {
        self.doc_mut()?.mode = EditMode::Idle;
        Ok(())
    }

    /// Appends a validated scene and returns its index.
    pub fn add_scene(&mut self, scene: Scene) -> EditorResult<usize> {
        self.edit(|doc| {
            scene.validate()?;
            let index = doc.template.scenes.len();
            doc.apply(TemplateCommand::InsertScene { index, scene })?;
            doc.mode = EditMode::Idle;
            Ok(index)
        })
    }

    pub fn update_scene(&mut self, index: usize, scene: Scene) -> EditorResult<()> {
        self.edit(|doc| {
            doc.check_index(index)?;
            scene.validate()?;
            doc.apply(TemplateCommand::ReplaceScene { index, scene })?;
            if doc.mode.scene_index() == Some(index) {
                doc.mode = EditMode::Idle;
            }
            Ok(())
        })
    }

    /// Applies the scene form to whichever scene mode is active.
    pub fn submit_scene_form(&mut self, form: SceneForm) -> EditorResult<usize> {
        let mode = self.doc()?.mode;
        let scene = form.into_scene().map_err(|e| self.fail(e.into()))?;
        match mode {
            EditMode::AddingScene => self.add_scene(scene),
            EditMode::EditingScene(index) => self.update_scene(index, scene).map(|_| index),
            _ => Err(self.fail(EditorError::InvalidMode("no scene form is open"))),
        }
    }

    pub fn delete_scene(&mut self, index: usize) -> EditorResult<Scene> {
        self.edit(|doc| {
            let removed = doc.template.scene(index)?.clone();
            doc.apply(TemplateCommand::RemoveScene { index })?;
            Ok(removed)
        })
    }

    /// Moves the scene at `from` so it ends up at `to`. Clears the selection.
    pub fn move_scene(&mut self, from: usize, to: usize) -> EditorResult<()> {
        self.edit(|doc| doc.apply(TemplateCommand::MoveScene { from, to }))
    }

    pub fn set_resolution(&mut self, resolution: &str) -> EditorResult<()> {
        self.edit(|doc| {
            let dims: Dimensions = resolution
                .parse()
                .map_err(|e: String| TemplateError::invalid("resolution", e))?;
            if !dims.is_positive() {
                return Err(TemplateError::invalid(
                    "resolution",
                    "width and height must be positive",
                ));
            }
            doc.apply(TemplateCommand::SetResolution {
                resolution: dims.to_string(),
            })
        })
    }

    /// Sets or clears the audio track; a blank path clears it.
    pub fn set_audio(&mut self, audio: Option<&str>) -> EditorResult<()> {
        let audio = audio
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        self.edit(|doc| doc.apply(TemplateCommand::SetAudio { audio }))
    }

    pub fn undo(&mut self) -> EditorResult<()> {
        self.edit(|doc| {
            let command = doc.history.undo(&mut doc.template)?;
            doc.after_change(command.reindexes());
            Ok(())
        })
    }

    pub fn redo(&mut self) -> EditorResult<()> {
        self.edit(|doc| {
            let command = doc.history.redo(&mut doc.template)?;
            doc.after_change(command.reindexes());
            Ok(())
        })
    }

    /// Uploads a media file and returns the reference to use as a scene or overlay path.
    pub async fn upload_media(
        &mut self,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> EditorResult<StoredMedia> {
        let file_name = metadata.file_name.clone();
        match self.backend.upload(data, metadata, progress).await {
            Ok(stored) => {
                self.notify(
                    NoticeLevel::Success,
                    format!("Uploaded {} to {}", file_name, stored.file_path),
                );
                Ok(stored)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Uploads an image and appends it as an overlay to the open scene form.
    ///
    /// The upload happens only once the form's other fields parse, and the
    /// scene form is left untouched if either step fails.
    pub async fn upload_overlay(
        &mut self,
        scene: &mut SceneForm,
        overlay: ImageOverlayForm,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> EditorResult<usize> {
        let mode = self.doc()?.mode;
        match mode {
            EditMode::AddingScene | EditMode::EditingScene(_) => {}
            _ => return Err(self.fail(EditorError::InvalidMode("no scene form is open"))),
        }
        let placeholder = ImageOverlayForm {
            path: metadata.file_name.clone(),
            ..overlay.clone()
        };
        placeholder
            .into_overlay()
            .map_err(|e| self.fail(e.into()))?;

        let stored = self.upload_media(data, metadata, progress).await?;
        let form = ImageOverlayForm {
            path: stored.file_path,
            ..overlay
        };
        scene.add_overlay(form).map_err(|e| self.fail(e.into()))
    }

    /// Uploads an audio file and makes it the template's soundtrack.
    pub async fn attach_audio(
        &mut self,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> EditorResult<StoredMedia> {
        self.doc()?;
        let stored = self.upload_media(data, metadata, progress).await?;
        self.set_audio(Some(&stored.file_path))?;
        Ok(stored)
    }

    /// Enters scene preview and returns the scene as pretty JSON.
    pub fn preview_scene(&mut self, index: usize) -> EditorResult<String> {
        self.edit(|doc| {
            let json = serde_json::to_string_pretty(doc.template.scene(index)?)?;
            doc.mode = EditMode::Previewing(PreviewTarget::Scene(index));
            doc.selection = None;
            Ok(json)
        })
    }

    pub fn preview_template(&mut self) -> EditorResult<String> {
        self.edit(|doc| {
            let json = doc.template.to_pretty_json()?;
            doc.mode = EditMode::Previewing(PreviewTarget::Template);
            doc.selection = None;
            Ok(json)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalBackend;
    use async_trait::async_trait;
    use std::sync::Arc;
    use storage::{LocalMediaStore, MemoryTemplateStore, StoreResult, TemplateStore, UploadPolicy};
    use template::form::TextOverlayForm;
    use template::{SceneType, Transition};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryTemplateStore>,
        editor: Editor,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryTemplateStore::new());
        let media = Arc::new(LocalMediaStore::open(dir.path(), UploadPolicy::default()).unwrap());
        let backend = LocalBackend::new(store.clone(), media);
        Fixture {
            _dir: dir,
            store,
            editor: Editor::new(Box::new(backend)),
        }
    }

    fn scene(path: &str) -> Scene {
        Scene::new(SceneType::Video, path)
    }

    fn paths(editor: &Editor) -> Vec<String> {
        editor
            .template()
            .unwrap()
            .scenes
            .iter()
            .map(|s| s.path.clone())
            .collect()
    }

    fn stored_with(store: &MemoryTemplateStore, name: &str, scene_paths: &[&str]) {
        let template = Template {
            scenes: scene_paths.iter().map(|p| scene(p)).collect(),
            ..Template::default()
        };
        store.create(&template, Some(name)).unwrap();
    }

    /// Backend whose writes always fail.
    struct BrokenBackend;

    #[async_trait]
    impl TemplateBackend for BrokenBackend {
        async fn list(&self) -> StoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn read(&self, name: &str) -> StoreResult<Template> {
            Err(StoreError::Upstream(format!("cannot read {}", name)))
        }
        async fn create(&self, _: &Template, _: Option<&str>) -> StoreResult<String> {
            Err(StoreError::Upstream("disk full".to_string()))
        }
        async fn update(&self, _: &str, _: &Template) -> StoreResult<()> {
            Err(StoreError::Upstream("disk full".to_string()))
        }
        async fn upload(
            &self,
            _: Vec<u8>,
            _: UploadMetadata,
            _: Option<ProgressFn>,
        ) -> StoreResult<StoredMedia> {
            Err(StoreError::Upstream("network down".to_string()))
        }
    }

    #[tokio::test]
    async fn starts_with_no_template() {
        let mut f = fixture();
        assert!(matches!(f.editor.state(), EditorState::NoTemplate));
        assert!(matches!(
            f.editor.add_scene(scene("a.mp4")),
            Err(EditorError::NoTemplate)
        ));
        assert!(matches!(f.editor.save().await, Err(EditorError::NoTemplate)));
    }

    #[tokio::test]
    async fn save_new_then_update() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("uploads/a.mp4")).unwrap();
        let name = f.editor.save().await.unwrap();
        assert_eq!(f.editor.document().unwrap().filename(), Some(name.as_str()));
        assert_eq!(f.editor.templates(), &[name.clone()]);

        f.editor.add_scene(scene("uploads/b.mp4")).unwrap();
        assert_eq!(f.editor.save().await.unwrap(), name);
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.store.read(&name).unwrap().scenes.len(), 2);
    }

    #[tokio::test]
    async fn list_is_not_refreshed_after_update() {
        let mut f = fixture();
        stored_with(&f.store, "a.json", &["x.mp4"]);
        f.editor.load("a.json").await.unwrap();
        stored_with(&f.store, "b.json", &["y.mp4"]);
        f.editor.save().await.unwrap();
        assert!(f.editor.templates().is_empty());
        f.editor.refresh_list().await.unwrap();
        assert_eq!(f.editor.templates().len(), 2);
    }

    #[tokio::test]
    async fn missing_template_falls_back_to_blank_draft() {
        let mut f = fixture();
        let err = f.editor.load("ghost.json").await.unwrap_err();
        assert!(err.is_not_found());
        let doc = f.editor.document().unwrap();
        assert_eq!(doc.origin(), &Origin::Fallback);
        assert_eq!(doc.template(), &Template::default());
        assert_eq!(
            f.editor.drain_notices().last().map(|n| n.level),
            Some(NoticeLevel::Error)
        );

        // The draft is saved as a new file.
        f.editor.add_scene(scene("a.mp4")).unwrap();
        let name = f.editor.save().await.unwrap();
        assert!(name.starts_with("template_"));
    }

    #[tokio::test]
    async fn other_load_failures_keep_previous_state() {
        let mut f = fixture();
        stored_with(&f.store, "a.json", &["x.mp4"]);
        f.editor.load("a.json").await.unwrap();
        let err = f.editor.load("../etc.json").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(f.editor.document().unwrap().filename(), Some("a.json"));
    }

    #[tokio::test]
    async fn cancel_new_without_previous_closes() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.cancel_new().await.unwrap();
        assert!(matches!(f.editor.state(), EditorState::NoTemplate));
    }

    #[tokio::test]
    async fn cancel_new_reloads_previous_file() {
        let mut f = fixture();
        stored_with(&f.store, "a.json", &["x.mp4", "y.mp4"]);
        f.editor.load("a.json").await.unwrap();
        f.editor.create_new();
        f.editor.create_new();
        f.editor.add_scene(scene("z.mp4")).unwrap();
        f.editor.cancel_new().await.unwrap();
        assert_eq!(f.editor.document().unwrap().filename(), Some("a.json"));
        assert_eq!(paths(&f.editor), vec!["x.mp4", "y.mp4"]);
    }

    #[tokio::test]
    async fn cancel_is_only_valid_while_creating() {
        let mut f = fixture();
        stored_with(&f.store, "a.json", &["x.mp4"]);
        f.editor.load("a.json").await.unwrap();
        assert!(matches!(
            f.editor.cancel_new().await,
            Err(EditorError::InvalidMode(_))
        ));
    }

    #[tokio::test]
    async fn failed_save_keeps_document_and_new_status() {
        let mut editor = Editor::new(Box::new(BrokenBackend));
        editor.create_new();
        editor.add_scene(scene("a.mp4")).unwrap();
        let before = editor.template().unwrap().clone();

        assert!(matches!(
            editor.save().await,
            Err(EditorError::Backend(StoreError::Upstream(_)))
        ));
        let doc = editor.document().unwrap();
        assert!(doc.is_new());
        assert!(doc.is_dirty());
        assert_eq!(doc.template(), &before);
    }

    #[tokio::test]
    async fn failed_upload_leaves_document_unchanged() {
        let mut editor = Editor::new(Box::new(BrokenBackend));
        editor.create_new();
        let before = editor.template().unwrap().clone();
        assert!(editor
            .attach_audio(b"ID3".to_vec(), UploadMetadata::new("song.mp3"), None)
            .await
            .is_err());
        assert_eq!(editor.template().unwrap(), &before);
    }

    #[tokio::test]
    async fn invalid_document_is_rejected_before_backend() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("a.mp4")).unwrap();
        if let EditorState::Loaded(doc) = &mut f.editor.state {
            doc.template.scenes[0].duration = 0;
        }
        let err = f.editor.save().await.unwrap_err();
        assert!(err.is_validation());
        assert!(f.store.is_empty());
    }

    #[test]
    fn invalid_scene_is_not_added() {
        let mut f = fixture();
        f.editor.create_new();
        let err = f.editor.add_scene(scene("")).unwrap_err();
        assert!(err.is_validation());
        assert!(f.editor.template().unwrap().scenes.is_empty());
    }

    #[test]
    fn update_validates_before_replacing() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("a.mp4")).unwrap();
        let mut bad = scene("b.mp4");
        bad.duration = 0;
        assert!(f.editor.update_scene(0, bad).is_err());
        assert_eq!(paths(&f.editor), vec!["a.mp4"]);
    }

    #[test]
    fn reorder_resets_selection_and_scene_mode() {
        let mut f = fixture();
        f.editor.create_new();
        for p in ["a", "b", "c"] {
            f.editor.add_scene(scene(p)).unwrap();
        }
        f.editor.select_scene(2).unwrap();
        f.editor.move_scene(2, 0).unwrap();
        assert_eq!(paths(&f.editor), vec!["c", "a", "b"]);
        assert_eq!(f.editor.document().unwrap().selection(), None);

        f.editor.begin_edit_scene(1).unwrap();
        f.editor.move_scene(0, 2).unwrap();
        assert_eq!(f.editor.document().unwrap().mode(), EditMode::Idle);
    }

    #[test]
    fn modes_and_selection_are_exclusive() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("a")).unwrap();
        f.editor.select_scene(0).unwrap();
        f.editor.begin_add_scene().unwrap();
        let doc = f.editor.document().unwrap();
        assert_eq!(doc.mode(), EditMode::AddingScene);
        assert_eq!(doc.selection(), None);

        f.editor.select_scene(0).unwrap();
        assert_eq!(f.editor.document().unwrap().mode(), EditMode::Idle);
        assert!(f.editor.select_scene(4).is_err());
    }

    #[test]
    fn scene_form_adds_and_edits() {
        let mut f = fixture();
        f.editor.create_new();
        assert!(matches!(
            f.editor.submit_scene_form(SceneForm::default()),
            Err(EditorError::Template(_))
        ));

        f.editor.begin_add_scene().unwrap();
        let form = SceneForm {
            path: "uploads/a.mp4".to_string(),
            transition: Transition::CircleClose,
            ..SceneForm::default()
        };
        assert_eq!(f.editor.submit_scene_form(form).unwrap(), 0);
        assert_eq!(f.editor.document().unwrap().mode(), EditMode::Idle);

        let mut form = f.editor.begin_edit_scene(0).unwrap();
        form.duration = "4".to_string();
        f.editor.submit_scene_form(form).unwrap();
        let scene = f.editor.template().unwrap().scenes[0].clone();
        assert_eq!(scene.duration, 4);
        assert_eq!(scene.transition, Transition::CircleClose);
        assert_eq!(f.editor.document().unwrap().mode(), EditMode::Idle);

        assert!(matches!(
            f.editor.submit_scene_form(SceneForm::from_scene(&scene)),
            Err(EditorError::InvalidMode(_))
        ));
    }

    #[test]
    fn undo_and_redo_scene_changes() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("a")).unwrap();
        f.editor.add_scene(scene("b")).unwrap();
        f.editor.move_scene(1, 0).unwrap();
        f.editor.undo().unwrap();
        assert_eq!(paths(&f.editor), vec!["a", "b"]);
        f.editor.redo().unwrap();
        assert_eq!(paths(&f.editor), vec!["b", "a"]);
        f.editor.delete_scene(0).unwrap();
        f.editor.undo().unwrap();
        assert_eq!(paths(&f.editor), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn history_resets_on_load() {
        let mut f = fixture();
        stored_with(&f.store, "a.json", &["x.mp4"]);
        f.editor.create_new();
        f.editor.add_scene(scene("a")).unwrap();
        assert!(f.editor.document().unwrap().can_undo());
        f.editor.load("a.json").await.unwrap();
        assert!(!f.editor.document().unwrap().can_undo());
    }

    #[test]
    fn top_level_setters() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.set_resolution("1280X720").unwrap();
        assert_eq!(f.editor.template().unwrap().resolution, "1280x720");
        assert!(f.editor.set_resolution("0x720").is_err());
        assert!(f.editor.set_resolution("big").is_err());

        f.editor.set_audio(Some("uploads/song.mp3")).unwrap();
        assert_eq!(
            f.editor.template().unwrap().audio.as_deref(),
            Some("uploads/song.mp3")
        );
        f.editor.set_audio(Some("  ")).unwrap();
        assert_eq!(f.editor.template().unwrap().audio, None);
    }

    #[test]
    fn previews_return_json() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("uploads/a.mp4")).unwrap();
        let json = f.editor.preview_scene(0).unwrap();
        assert!(json.contains("\"path\": \"uploads/a.mp4\""));
        assert_eq!(
            f.editor.document().unwrap().mode(),
            EditMode::Previewing(PreviewTarget::Scene(0))
        );
        let whole = f.editor.preview_template().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&whole).unwrap();
        assert_eq!(parsed["scenes"].as_array().unwrap().len(), 1);
        f.editor.finish_mode().unwrap();
        assert_eq!(f.editor.document().unwrap().mode(), EditMode::Idle);
    }

    #[tokio::test]
    async fn overlays_are_authored_through_the_scene_form() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("uploads/a.mp4")).unwrap();

        let mut form = f.editor.begin_edit_scene(0).unwrap();
        form.add_text(TextOverlayForm {
            content: "Hello".to_string(),
            start: "1".to_string(),
            end: "3".to_string(),
            ..TextOverlayForm::default()
        })
        .unwrap();
        let index = f
            .editor
            .upload_overlay(
                &mut form,
                ImageOverlayForm::default(),
                b"GIF89a".to_vec(),
                UploadMetadata::new("logo.gif"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(index, 0);
        f.editor.submit_scene_form(form).unwrap();

        let stored = f.editor.template().unwrap().scenes[0].clone();
        assert_eq!(stored.text[0].content, "Hello");
        assert_eq!(stored.text[0].end, 3.0);
        assert!(stored.overlays[0].path.starts_with("uploads/"));
        assert!(stored.overlays[0].path.ends_with(".gif"));

        let mut form = f.editor.begin_edit_scene(0).unwrap();
        form.remove_text(0).unwrap();
        form.remove_overlay(0).unwrap();
        f.editor.submit_scene_form(form).unwrap();
        let cleared = &f.editor.template().unwrap().scenes[0];
        assert!(cleared.text.is_empty() && cleared.overlays.is_empty());

        f.editor.undo().unwrap();
        assert_eq!(f.editor.template().unwrap().scenes[0], stored);
    }

    #[tokio::test]
    async fn overlay_upload_needs_an_open_form_and_valid_fields() {
        let mut f = fixture();
        f.editor.create_new();
        f.editor.add_scene(scene("uploads/a.mp4")).unwrap();

        let mut form = SceneForm::from_scene(&scene("uploads/a.mp4"));
        let result = f
            .editor
            .upload_overlay(
                &mut form,
                ImageOverlayForm::default(),
                b"GIF89a".to_vec(),
                UploadMetadata::new("logo.gif"),
                None,
            )
            .await;
        assert!(matches!(result, Err(EditorError::InvalidMode(_))));

        let mut form = f.editor.begin_edit_scene(0).unwrap();
        let bad = ImageOverlayForm {
            scale_width: "0".to_string(),
            ..ImageOverlayForm::default()
        };
        let result = f
            .editor
            .upload_overlay(
                &mut form,
                bad,
                b"GIF89a".to_vec(),
                UploadMetadata::new("logo.gif"),
                None,
            )
            .await;
        assert!(matches!(result, Err(EditorError::Template(_))));
        assert!(form.overlays.is_empty());
        assert!(!f
            .editor
            .notices()
            .iter()
            .any(|n| n.message.starts_with("Uploaded")));
    }

    #[tokio::test]
    async fn attach_audio_uploads_and_sets_track() {
        let mut f = fixture();
        f.editor.create_new();
        let stored = f
            .editor
            .attach_audio(b"ID3".to_vec(), UploadMetadata::new("song.mp3"), None)
            .await
            .unwrap();
        assert_eq!(
            f.editor.template().unwrap().audio.as_deref(),
            Some(stored.file_path.as_str())
        );
    }
}
