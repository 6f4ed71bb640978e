use serde::{Deserialize, Serialize};

use crate::{Scene, Template, TemplateError};

/// An in-memory mutation of a template. Applying one yields its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TemplateCommand {
    InsertScene { index: usize, scene: Scene },
    RemoveScene { index: usize },
    ReplaceScene { index: usize, scene: Scene },
    MoveScene { from: usize, to: usize },
    SetResolution { resolution: String },
    SetAudio { audio: Option<String> },
}

impl TemplateCommand {
    /// Whether scene indices may refer to different scenes after this command.
    pub fn reindexes(&self) -> bool {
        matches!(
            self,
            Self::InsertScene { .. } | Self::RemoveScene { .. } | Self::MoveScene { .. }
        )
    }
}

pub fn apply_command(
    template: &mut Template,
    command: TemplateCommand,
) -> Result<TemplateCommand, TemplateError> {
    match command {
        TemplateCommand::InsertScene { index, scene } => insert_scene(template, index, scene),
        TemplateCommand::RemoveScene { index } => remove_scene(template, index),
        TemplateCommand::ReplaceScene { index, scene } => replace_scene(template, index, scene),
        TemplateCommand::MoveScene { from, to } => move_scene(template, from, to),
        TemplateCommand::SetResolution { resolution } => {
            let previous = std::mem::replace(&mut template.resolution, resolution);
            Ok(TemplateCommand::SetResolution {
                resolution: previous,
            })
        }
        TemplateCommand::SetAudio { audio } => {
            let previous = std::mem::replace(&mut template.audio, audio);
            Ok(TemplateCommand::SetAudio { audio: previous })
        }
    }
}

fn check_index(template: &Template, index: usize) -> Result<(), TemplateError> {
    if index < template.scenes.len() {
        Ok(())
    } else {
        Err(TemplateError::IndexOutOfBounds {
            index,
            len: template.scenes.len(),
        })
    }
}

fn insert_scene(
    template: &mut Template,
    index: usize,
    scene: Scene,
) -> Result<TemplateCommand, TemplateError> {
    if index > template.scenes.len() {
        return Err(TemplateError::IndexOutOfBounds {
            index,
            len: template.scenes.len(),
        });
    }
    template.scenes.insert(index, scene);
    Ok(TemplateCommand::RemoveScene { index })
}

fn remove_scene(template: &mut Template, index: usize) -> Result<TemplateCommand, TemplateError> {
    check_index(template, index)?;
    let scene = template.scenes.remove(index);
    Ok(TemplateCommand::InsertScene { index, scene })
}

fn replace_scene(
    template: &mut Template,
    index: usize,
    scene: Scene,
) -> Result<TemplateCommand, TemplateError> {
    check_index(template, index)?;
    let previous = std::mem::replace(&mut template.scenes[index], scene);
    Ok(TemplateCommand::ReplaceScene {
        index,
        scene: previous,
    })
}

/// Stable array move: remove at `from`, insert at `to`.
fn move_scene(
    template: &mut Template,
    from: usize,
    to: usize,
) -> Result<TemplateCommand, TemplateError> {
    check_index(template, from)?;
    check_index(template, to)?;
    let scene = template.scenes.remove(from);
    template.scenes.insert(to, scene);
    Ok(TemplateCommand::MoveScene { from: to, to: from })
}

#[derive(Debug, Default, Clone)]
pub struct CommandHistory {
    undo_stack: Vec<TemplateCommand>,
    redo_stack: Vec<TemplateCommand>,
}

impl CommandHistory {
    pub fn apply(
        &mut self,
        template: &mut Template,
        command: TemplateCommand,
    ) -> Result<(), TemplateError> {
        let inverse = apply_command(template, command)?;
        self.undo_stack.push(inverse);
        self.redo_stack.clear();
        Ok(())
    }

    /// Reverts the most recent command and returns the command that was applied to do so.
    pub fn undo(&mut self, template: &mut Template) -> Result<TemplateCommand, TemplateError> {
        let command = self
            .undo_stack
            .pop()
            .ok_or(TemplateError::HistoryEmpty("undo stack"))?;
        let inverse = apply_command(template, command)?;
        self.redo_stack.push(inverse.clone());
        Ok(inverse)
    }

    pub fn redo(&mut self, template: &mut Template) -> Result<TemplateCommand, TemplateError> {
        let command = self
            .redo_stack
            .pop()
            .ok_or(TemplateError::HistoryEmpty("redo stack"))?;
        let inverse = apply_command(template, command)?;
        self.undo_stack.push(inverse.clone());
        Ok(inverse)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
