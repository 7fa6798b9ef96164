use crate::content::StageContent;
use std::collections::VecDeque;

/// Commands the UI emits. They queue up until the stage is running, then each
/// is consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCommand {
    /// Index into the skill-group list.
    SelectGroup(usize),
    /// Skill item name, matched against the flat skill list.
    SelectSkill(String),
    AdvanceCommits,
    CycleTheme,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<StageCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: StageCommand) {
        self.pending.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains everything when `running`, otherwise leaves the queue untouched
    /// so commands fire once the stage gets there.
    pub fn drain_if(&mut self, running: bool) -> Vec<StageCommand> {
        if running {
            self.pending.drain(..).collect()
        } else {
            Vec::new()
        }
    }
}

/// Group link for a skill-group index, with the catch-all bucket as fallback.
pub fn group_link(content: &StageContent, index: usize) -> String {
    content
        .skills
        .get(index)
        .and_then(|group| group.group_link.clone())
        .unwrap_or_else(|| "common".to_string())
}

/// Every link name group selection decides over: declared models, promoted
/// overrides, the commit diorama and the sketch boards.
pub fn selectable_links(content: &StageContent) -> Vec<String> {
    let mut links: Vec<String> = content.models.iter().map(|m| m.link_name.clone()).collect();
    links.extend(content.overrides.iter().map(|o| o.link_name.clone()));
    links.push(crate::commit_graph::CONTAINER_NAME.to_string());
    links.extend(content.boards.iter().map(|b| b.name.clone()));
    links
}
