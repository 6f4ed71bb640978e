use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use editor::{Editor, EditorResult, HttpBackend, LocalBackend, ProgressFn, TemplateBackend};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{FsTemplateStore, LocalMediaStore, UploadMetadata, UploadPolicy};
use template::form::{FilterChoice, ImageOverlayForm, SceneForm, TextOverlayForm};
use template::{migrate, SceneType, Template, TemplateError, Transition};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "template-cli")]
#[command(about = "Video template editor CLI - create and edit template documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Template server to talk to
    #[arg(long, global = true, env = "TEMPLATE_SERVER_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Work on a local directory (data/ and uploads/) instead of a server
    #[arg(long, global = true)]
    local: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved templates
    List,

    /// Print a template as JSON
    Show {
        file: String,
    },

    /// Create and save a new template
    New {
        /// Output resolution, e.g. 1280x720
        #[arg(long)]
        resolution: Option<String>,

        /// Audio track path
        #[arg(long)]
        audio: Option<String>,

        /// Filename to save under (generated when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Upload a media file and append it as a scene
    AddScene {
        file: String,

        /// Local media file to upload
        #[arg(long)]
        media: PathBuf,

        /// Scene type (video, image)
        #[arg(long = "type", default_value = "video")]
        kind: SceneType,

        /// Duration in seconds
        #[arg(long, default_value = "10")]
        duration: String,

        /// Transition (fade, circleclose, wipeleft, wiperight, slideup, slidedown)
        #[arg(long, default_value = "fade")]
        transition: Transition,
    },

    /// Delete the scene at an index
    DeleteScene {
        file: String,
        index: usize,
    },

    /// Add a text overlay to a scene
    AddText {
        file: String,
        index: usize,

        #[arg(long)]
        content: String,

        /// Start time in seconds
        #[arg(long, default_value = "0")]
        start: String,

        /// End time in seconds
        #[arg(long, default_value = "5")]
        end: String,

        /// Horizontal position, percent of the frame width
        #[arg(long, default_value = "50")]
        x: String,

        /// Vertical position, percent of the frame height
        #[arg(long, default_value = "50")]
        y: String,

        #[arg(long, default_value = "24")]
        font_size: String,

        #[arg(long, default_value = "#ffffff")]
        color: String,

        #[arg(long, default_value = "#000000")]
        box_color: String,

        #[arg(long, default_value = "0")]
        box_opacity: String,

        #[arg(long, default_value = "0")]
        padding: String,
    },

    /// Remove a text overlay from a scene
    RemoveText {
        file: String,
        index: usize,
        text: usize,
    },

    /// Upload an image and add it as an overlay to a scene
    AddOverlay {
        file: String,
        index: usize,

        /// Local image file to upload
        #[arg(long)]
        image: PathBuf,

        /// Horizontal position in pixels
        #[arg(long, default_value = "10")]
        x: String,

        /// Vertical position in pixels
        #[arg(long, default_value = "10")]
        y: String,

        /// Overlay size, e.g. 320x180
        #[arg(long, default_value = "1920x1080")]
        scale: String,

        #[arg(long, default_value = "0")]
        start: String,

        #[arg(long, default_value = "5")]
        end: String,
    },

    /// Remove an image overlay from a scene
    RemoveOverlay {
        file: String,
        index: usize,
        overlay: usize,
    },

    /// Move a scene from one index to another
    MoveScene {
        file: String,
        from: usize,
        to: usize,
    },

    /// Set or clear a scene's color channel mixer
    SetFilter {
        file: String,
        index: usize,

        #[arg(long, conflicts_with = "none")]
        rr: Option<String>,

        #[arg(long, conflicts_with = "none")]
        gg: Option<String>,

        #[arg(long, conflicts_with = "none")]
        bb: Option<String>,

        /// Remove the filter
        #[arg(long)]
        none: bool,
    },

    /// Rewrite a legacy template file into the current schema
    Migrate {
        input: PathBuf,

        /// Where to write the result (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a template file against every document rule
    Validate {
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Migrate { input, output } => return migrate_command(&input, output).await,
        Commands::Validate { input } => return validate_command(&input).await,
        _ => {}
    }

    let mut editor = Editor::new(backend(&cli)?);
    let result = match cli.command {
        Commands::List => list_command(&mut editor).await,
        Commands::Show { file } => show_command(&mut editor, &file).await,
        Commands::New {
            resolution,
            audio,
            name,
        } => new_command(&mut editor, resolution, audio, name).await,
        Commands::AddScene {
            file,
            media,
            kind,
            duration,
            transition,
        } => add_scene_command(&mut editor, &file, &media, kind, duration, transition).await,
        Commands::DeleteScene { file, index } => {
            edit_and_save(&mut editor, &file, |e| e.delete_scene(index).map(|_| ())).await
        }
        Commands::MoveScene { file, from, to } => {
            edit_and_save(&mut editor, &file, |e| e.move_scene(from, to)).await
        }
        Commands::AddText {
            file,
            index,
            content,
            start,
            end,
            x,
            y,
            font_size,
            color,
            box_color,
            box_opacity,
            padding,
        } => {
            let text = TextOverlayForm {
                content,
                start,
                end,
                x_position: x,
                y_position: y,
                font_size,
                color,
                box_color,
                box_opacity,
                padding,
                editable: false,
            };
            edit_scene_and_save(&mut editor, &file, index, |form| {
                form.add_text(text).map(|_| ())
            })
            .await
        }
        Commands::RemoveText { file, index, text } => {
            edit_scene_and_save(&mut editor, &file, index, |form| {
                form.remove_text(text).map(|_| ())
            })
            .await
        }
        Commands::AddOverlay {
            file,
            index,
            image,
            x,
            y,
            scale,
            start,
            end,
        } => {
            add_overlay_command(&mut editor, &file, index, &image, x, y, &scale, start, end)
                .await
        }
        Commands::RemoveOverlay {
            file,
            index,
            overlay,
        } => {
            edit_scene_and_save(&mut editor, &file, index, |form| {
                form.remove_overlay(overlay).map(|_| ())
            })
            .await
        }
        Commands::SetFilter {
            file,
            index,
            rr,
            gg,
            bb,
            none,
        } => set_filter_command(&mut editor, &file, index, rr, gg, bb, none).await,
        Commands::Migrate { .. } | Commands::Validate { .. } => Ok(()),
    };

    for notice in editor.drain_notices() {
        eprintln!("{}", notice);
    }
    result
}

fn backend(cli: &Cli) -> Result<Box<dyn TemplateBackend>> {
    match &cli.local {
        Some(dir) => {
            debug!("Using local directory {:?}", dir);
            let templates = Arc::new(FsTemplateStore::open(dir.join("data"))?);
            let media = Arc::new(LocalMediaStore::open(
                dir.join("uploads"),
                UploadPolicy::default(),
            )?);
            Ok(Box::new(LocalBackend::new(templates, media)))
        }
        None => {
            debug!("Using template server {}", cli.server);
            Ok(Box::new(HttpBackend::new(cli.server.clone())?))
        }
    }
}

/// Loads `file`, treating a missing template as an error rather than starting a blank one.
async fn open(editor: &mut Editor, file: &str) -> Result<()> {
    editor
        .load(file)
        .await
        .with_context(|| format!("could not open {}", file))
}

async fn list_command(editor: &mut Editor) -> Result<()> {
    editor.refresh_list().await?;
    if editor.templates().is_empty() {
        info!("No templates saved yet");
    }
    for name in editor.templates() {
        println!("{}", name);
    }
    Ok(())
}

async fn show_command(editor: &mut Editor, file: &str) -> Result<()> {
    open(editor, file).await?;
    println!("{}", editor.preview_template()?);
    Ok(())
}

async fn new_command(
    editor: &mut Editor,
    resolution: Option<String>,
    audio: Option<String>,
    name: Option<String>,
) -> Result<()> {
    editor.create_new();
    if let Some(resolution) = resolution {
        editor.set_resolution(&resolution)?;
    }
    if audio.is_some() {
        editor.set_audio(audio.as_deref())?;
    }
    let saved = match name {
        Some(name) => editor.save_as(&name).await?,
        None => editor.save().await?,
    };
    println!("{}", saved);
    Ok(())
}

async fn add_scene_command(
    editor: &mut Editor,
    file: &str,
    media: &Path,
    kind: SceneType,
    duration: String,
    transition: Transition,
) -> Result<()> {
    open(editor, file).await?;
    let (data, metadata) = read_media(media).await?;
    let stored = editor
        .upload_media(data, metadata, Some(progress_printer()))
        .await?;

    editor.begin_add_scene()?;
    let form = SceneForm {
        kind,
        path: stored.file_path,
        duration,
        transition,
        ..Default::default()
    };
    let index = editor.submit_scene_form(form)?;
    let saved = editor.save().await?;
    info!("Added scene {} to {}", index, saved);
    Ok(())
}

async fn read_media(path: &Path) -> Result<(Vec<u8>, UploadMetadata)> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("media path has no file name")?
        .to_string();
    info!("Uploading {} ({} bytes)", file_name, data.len());
    Ok((data, UploadMetadata::new(file_name)))
}

fn progress_printer() -> ProgressFn {
    Arc::new(|pct: u8| {
        eprint!("\rUploading... {:>3}%", pct);
        if pct == 100 {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    })
}

/// Opens scene `index` for editing, applies `edit` to its form and saves.
async fn edit_scene_and_save(
    editor: &mut Editor,
    file: &str,
    index: usize,
    edit: impl FnOnce(&mut SceneForm) -> Result<(), TemplateError>,
) -> Result<()> {
    open(editor, file).await?;
    let mut form = editor.begin_edit_scene(index)?;
    edit(&mut form)?;
    editor.submit_scene_form(form)?;
    editor.save().await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn add_overlay_command(
    editor: &mut Editor,
    file: &str,
    index: usize,
    image: &Path,
    x: String,
    y: String,
    scale: &str,
    start: String,
    end: String,
) -> Result<()> {
    let (scale_width, scale_height) = scale
        .split_once(['x', 'X'])
        .with_context(|| format!("scale `{}` is not WIDTHxHEIGHT", scale))?;
    let overlay = ImageOverlayForm {
        path: String::new(),
        x_position: x,
        y_position: y,
        scale_width: scale_width.to_string(),
        scale_height: scale_height.to_string(),
        start,
        end,
    };

    open(editor, file).await?;
    let mut form = editor.begin_edit_scene(index)?;
    let (data, metadata) = read_media(image).await?;
    let position = editor
        .upload_overlay(&mut form, overlay, data, metadata, Some(progress_printer()))
        .await?;
    editor.submit_scene_form(form)?;
    let saved = editor.save().await?;
    info!("Added overlay {} to scene {} of {}", position, index, saved);
    Ok(())
}

async fn edit_and_save(
    editor: &mut Editor,
    file: &str,
    edit: impl FnOnce(&mut Editor) -> EditorResult<()>,
) -> Result<()> {
    open(editor, file).await?;
    edit(editor)?;
    editor.save().await?;
    Ok(())
}

async fn set_filter_command(
    editor: &mut Editor,
    file: &str,
    index: usize,
    rr: Option<String>,
    gg: Option<String>,
    bb: Option<String>,
    none: bool,
) -> Result<()> {
    open(editor, file).await?;
    let mut form = editor.begin_edit_scene(index)?;
    if none {
        form.filter = FilterChoice::None;
    } else {
        if rr.is_none() && gg.is_none() && bb.is_none() {
            bail!("give --rr/--gg/--bb or --none");
        }
        form.filter = FilterChoice::ColorChannelMixer;
        if let Some(rr) = rr {
            form.rr = rr;
        }
        if let Some(gg) = gg {
            form.gg = gg;
        }
        if let Some(bb) = bb {
            form.bb = bb;
        }
    }
    editor.submit_scene_form(form)?;
    editor.save().await?;

    let filter = editor
        .template()
        .and_then(|t| t.scenes.get(index))
        .and_then(|scene| scene.filter.as_ref())
        .map_or("none", |filter| filter.kind_name());
    info!("Scene {} filter: {}", index, filter);
    Ok(())
}

async fn migrate_command(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let (migrated, report) = migrate(value)?;

    if report.is_empty() {
        info!("{} is already in the current format", input.display());
    }
    for change in &report.changes {
        info!("{}: {}", change.location, change.description);
    }

    let pretty = serde_json::to_string_pretty(&migrated)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, pretty).await?;
            info!("Migrated template written to: {:?}", path);
        }
        None => println!("{}", pretty),
    }
    Ok(())
}

async fn validate_command(input: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let (template, report) = Template::from_json_str(&raw)?;
    if !report.is_empty() {
        info!(
            "{} uses {} legacy field(s); run `migrate` to update it",
            input.display(),
            report.changes.len()
        );
    }
    match template.validate() {
        Ok(()) => {
            println!(
                "{} is valid: {} scene(s), {}s total",
                input.display(),
                template.scenes.len(),
                template.total_duration()
            );
            Ok(())
        }
        Err(TemplateError::Validation(issues)) => {
            for issue in &issues {
                println!("  {}", issue);
            }
            bail!("{} has {} problem(s)", input.display(), issues.len())
        }
        Err(e) => Err(e.into()),
    }
}
