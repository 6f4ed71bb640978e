use editor::{Editor, EditorError, EditorState, LocalBackend, ProgressFn};
use std::sync::{Arc, Mutex};
use storage::{FsTemplateStore, LocalMediaStore, TemplateStore, UploadMetadata, UploadPolicy};
use template::form::{FilterChoice, ImageOverlayForm, SceneForm, TextOverlayForm};
use template::{Scene, SceneType, Template, Transition};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    store: Arc<FsTemplateStore>,
    editor: Editor,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsTemplateStore::open(dir.path().join("data")).unwrap());
    let media = Arc::new(
        LocalMediaStore::open(dir.path().join("uploads"), UploadPolicy::default()).unwrap(),
    );
    let editor = Editor::new(Box::new(LocalBackend::new(store.clone(), media)));
    Workspace {
        _dir: dir,
        store,
        editor,
    }
}

#[tokio::test]
async fn new_template_with_uploaded_scene_is_persisted() {
    let mut ws = workspace();
    ws.editor.create_new();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |p: u8| sink.lock().unwrap().push(p));
    let stored = ws
        .editor
        .upload_media(
            vec![7u8; 200_000],
            UploadMetadata::new("intro.mp4"),
            Some(progress),
        )
        .await
        .unwrap();
    assert_eq!(seen.lock().unwrap().last(), Some(&100));

    ws.editor.begin_add_scene().unwrap();
    let form = SceneForm {
        path: stored.file_path.clone(),
        ..SceneForm::default()
    };
    ws.editor.submit_scene_form(form).unwrap();
    let name = ws.editor.save().await.unwrap();

    let saved = ws.store.read(&name).unwrap();
    assert_eq!(saved.scenes.len(), 1);
    let expected = Scene {
        kind: SceneType::Video,
        path: stored.file_path,
        duration: 10,
        transition: Transition::Fade,
        filter: None,
        editable: true,
        text: Vec::new(),
        overlays: Vec::new(),
    };
    assert_eq!(saved.scenes[0], expected);
    assert_eq!(ws.editor.templates(), &[name]);
}

#[tokio::test]
async fn overlays_added_in_a_scene_are_saved() {
    let mut ws = workspace();
    let template = Template {
        scenes: vec![Scene::new(SceneType::Video, "uploads/intro.mp4")],
        ..Template::default()
    };
    ws.store.create(&template, Some("promo.json")).unwrap();
    ws.editor.load("promo.json").await.unwrap();

    let mut form = ws.editor.begin_edit_scene(0).unwrap();
    form.add_text(TextOverlayForm {
        content: "Summer sale".to_string(),
        font_size: "48".to_string(),
        box_opacity: "0.5".to_string(),
        ..TextOverlayForm::default()
    })
    .unwrap();
    ws.editor
        .upload_overlay(
            &mut form,
            ImageOverlayForm {
                scale_width: "200".to_string(),
                scale_height: "100".to_string(),
                ..ImageOverlayForm::default()
            },
            vec![1u8; 1024],
            UploadMetadata::new("badge.png"),
            None,
        )
        .await
        .unwrap();
    ws.editor.submit_scene_form(form).unwrap();
    ws.editor.save().await.unwrap();

    let saved = ws.store.read("promo.json").unwrap();
    let scene = &saved.scenes[0];
    assert_eq!(scene.text[0].content, "Summer sale");
    assert_eq!(scene.text[0].font_size, 48.0);
    assert_eq!(scene.text[0].box_opacity, 0.5);
    assert_eq!(scene.overlays[0].scale.to_string(), "200x100");
    assert!(scene.overlays[0].path.ends_with(".png"));
}

#[tokio::test]
async fn deleting_first_of_two_scenes_keeps_the_second() {
    let mut ws = workspace();
    let mut second = Scene::new(SceneType::Image, "uploads/second.png");
    second.transition = Transition::SlideUp;
    let template = Template {
        scenes: vec![Scene::new(SceneType::Video, "uploads/first.mp4"), second.clone()],
        ..Template::default()
    };
    ws.store.create(&template, Some("two.json")).unwrap();

    ws.editor.load("two.json").await.unwrap();
    ws.editor.delete_scene(0).unwrap();
    assert_eq!(ws.editor.template().unwrap().scenes, vec![second]);

    // Nothing reaches storage until an explicit save.
    assert_eq!(ws.store.read("two.json").unwrap().scenes.len(), 2);
    ws.editor.save().await.unwrap();
    assert_eq!(ws.store.read("two.json").unwrap().scenes.len(), 1);
}

#[tokio::test]
async fn mixer_filter_without_settings_is_rejected() {
    let mut ws = workspace();
    ws.editor.create_new();
    ws.editor.begin_add_scene().unwrap();
    let form = SceneForm {
        path: "uploads/a.mp4".to_string(),
        filter: FilterChoice::ColorChannelMixer,
        bb: String::new(),
        ..SceneForm::default()
    };
    let err = ws.editor.submit_scene_form(form).unwrap_err();
    assert!(matches!(err, EditorError::Template(_)));
    assert!(ws.editor.template().unwrap().scenes.is_empty());

    // A legacy document that slipped through with a partial mixer never loads.
    std::fs::write(
        ws.store.root().join("partial.json"),
        r#"{"scenes":[{"type":"video","path":"a.mp4","duration":3,"transition":"fade",
            "filter":{"type":"colorchannelmixer","settings":{"rr":1.0,"gg":1.0}}}]}"#,
    )
    .unwrap();
    let err = ws.editor.load("partial.json").await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn cancel_new_returns_to_previous_or_nothing() {
    let mut ws = workspace();
    ws.editor.create_new();
    ws.editor.cancel_new().await.unwrap();
    assert!(matches!(ws.editor.state(), EditorState::NoTemplate));

    ws.store
        .create(
            &Template {
                resolution: "640x480".to_string(),
                ..Template::default()
            },
            Some("kept.json"),
        )
        .unwrap();
    ws.editor.load("kept.json").await.unwrap();
    ws.editor.create_new();
    ws.editor.set_resolution("1280x720").unwrap();
    ws.editor.cancel_new().await.unwrap();
    let doc = ws.editor.document().unwrap();
    assert_eq!(doc.filename(), Some("kept.json"));
    assert_eq!(doc.template().resolution, "640x480");
}

#[tokio::test]
async fn save_as_adopts_the_requested_name() {
    let mut ws = workspace();
    ws.editor.create_new();
    ws.editor
        .add_scene(Scene::new(SceneType::Video, "uploads/a.mp4"))
        .unwrap();
    assert_eq!(ws.editor.save_as("promo.json").await.unwrap(), "promo.json");
    assert_eq!(ws.editor.document().unwrap().filename(), Some("promo.json"));

    ws.editor.create_new();
    ws.editor
        .add_scene(Scene::new(SceneType::Video, "uploads/b.mp4"))
        .unwrap();
    let err = ws.editor.save_as("promo.json").await.unwrap_err();
    assert!(matches!(
        err,
        EditorError::Backend(storage::StoreError::Conflict(_))
    ));
    assert!(ws.editor.document().unwrap().is_new());
}
