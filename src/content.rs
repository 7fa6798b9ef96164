use anyhow::{Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Camera pose as declared in content: degrees for the angular parts so the
/// JSON stays human-editable; converted to radians at the camera boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseData {
    pub target: [f32; 3],
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub radius: f32,
}

impl PoseData {
    pub fn target_vec(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub file: String,
    pub link_name: String,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation_deg: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
    #[serde(default)]
    pub visibility: Option<f32>,
    #[serde(default)]
    pub camera_pose: Option<PoseData>,
}

/// A sub-node of a loaded model promoted to its own link name
/// (e.g. the JavaScript logo inside the combined logos model).
#[derive(Debug, Clone, Deserialize)]
pub struct MeshOverride {
    pub node_name: String,
    pub link_name: String,
    #[serde(default)]
    pub visibility: Option<f32>,
    #[serde(default)]
    pub camera_pose: Option<PoseData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TooltipSpec {
    pub link_name: String,
    pub anchor_node: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitSpec {
    pub message: String,
    /// Empty string marks a root commit, which must carry `position`.
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default)]
    pub offset: Option<[f32; 3]>,
    #[serde(default)]
    pub visibility: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAction {
    pub name: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillItem {
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub link_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillGroup {
    pub title: String,
    pub items: Vec<SkillItem>,
    #[serde(default)]
    pub group_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SketchBoardSpec {
    pub name: String,
    pub position: [f32; 3],
    pub rotation_deg: [f32; 3],
    pub box_size: [f32; 3],
}

/// Everything the stage shows, declared up front. The built-in set mirrors the
/// portfolio content; `--content` can point at an alternate JSON file with the
/// same shape.
#[derive(Debug, Clone, Deserialize)]
pub struct StageContent {
    pub models: Vec<ModelSpec>,
    #[serde(default)]
    pub overrides: Vec<MeshOverride>,
    #[serde(default)]
    pub tooltips: Vec<TooltipSpec>,
    /// Group name -> member link names. Pure filter for group selection.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub commits: BTreeMap<String, CommitSpec>,
    #[serde(default)]
    pub commit_actions: Vec<CommitAction>,
    #[serde(default)]
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    /// Link names that get the decorative idle bob/spin treatment.
    #[serde(default)]
    pub idle_models: Vec<String>,
    /// Link names whose root keeps facing the camera.
    #[serde(default)]
    pub billboard_models: Vec<String>,
    /// Link names that react to hover/click.
    #[serde(default)]
    pub pickable_models: Vec<String>,
    #[serde(default)]
    pub boards: Vec<SketchBoardSpec>,
    pub starting_camera: PoseData,
}

impl StageContent {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Reading content file {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Parsing content file {}", path.display()))
    }

    pub fn load_or_builtin(path: Option<&str>) -> Self {
        match path {
            Some(p) => match Self::load_from_path(p) {
                Ok(content) => content,
                Err(err) => {
                    eprintln!("[content] {err:?}. Using built-in content.");
                    Self::builtin()
                }
            },
            None => Self::builtin(),
        }
    }

    /// Flat lookup over all skill items; used by individual skill selection.
    pub fn skill_link(&self, skill_name: &str) -> Option<&str> {
        self.skills
            .iter()
            .flat_map(|group| group.items.iter())
            .find(|item| item.name == skill_name)
            .and_then(|item| item.link_name.as_deref())
    }

    /// Group membership for a link name; anything not claimed by a declared
    /// group lands in the "common" bucket.
    pub fn group_of(&self, link_name: &str) -> String {
        for (group, members) in &self.groups {
            if members.iter().any(|m| m == link_name) {
                return group.clone();
            }
        }
        "common".to_string()
    }

    pub fn builtin() -> Self {
        let deg270 = [0.0, 270.0, 0.0];
        let deg90 = [0.0, 90.0, 0.0];
        let models = vec![
            ModelSpec {
                file: "css3.gltf".into(),
                link_name: "css".into(),
                position: Some([0.0, 0.6, -1.6]),
                rotation_deg: Some(deg270),
                scale: Some([-0.007, 0.007, 0.007]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [2.0, 1.7, -2.0],
                    yaw_deg: 162.0,
                    pitch_deg: 85.0,
                    radius: 5.0,
                }),
            },
            ModelSpec {
                file: "react.gltf".into(),
                link_name: "react".into(),
                position: Some([0.0, 2.1, 0.0]),
                rotation_deg: Some(deg270),
                scale: Some([0.3, 0.3, 0.3]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [-1.0, 2.5, 0.0],
                    yaw_deg: 180.0,
                    pitch_deg: 65.0,
                    radius: 3.0,
                }),
            },
            ModelSpec {
                file: "logos.gltf".into(),
                link_name: "logos".into(),
                position: Some([0.0, 4.1, -1.1]),
                rotation_deg: Some(deg270),
                scale: Some([0.7, 0.7, -0.7]),
                visibility: Some(0.0),
                camera_pose: Some(PoseData {
                    target: [0.4, 3.5, -0.3],
                    yaw_deg: 170.0,
                    pitch_deg: 85.0,
                    radius: 6.0,
                }),
            },
            ModelSpec {
                file: "html5.gltf".into(),
                link_name: "html".into(),
                position: Some([0.0, 2.0, 1.6]),
                rotation_deg: Some([0.0, 180.0, 0.0]),
                scale: Some([0.25, 0.25, -0.25]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [2.0, 2.5, 1.8],
                    yaw_deg: 180.0,
                    pitch_deg: 85.0,
                    radius: 6.0,
                }),
            },
            ModelSpec {
                file: "git.gltf".into(),
                link_name: "git".into(),
                position: Some([0.0, 2.0, 0.0]),
                rotation_deg: Some(deg90),
                scale: Some([1.0, 1.0, 1.0]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [1.9, 1.7, 0.0],
                    yaw_deg: 180.0,
                    pitch_deg: 85.0,
                    radius: 5.0,
                }),
            },
            ModelSpec {
                file: "vscode.gltf".into(),
                link_name: "vscode".into(),
                position: Some([0.0, 2.0, 0.0]),
                rotation_deg: Some(deg90),
                scale: Some([0.4, 0.4, 0.4]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [1.9, 1.7, 0.0],
                    yaw_deg: 180.0,
                    pitch_deg: 85.0,
                    radius: 5.0,
                }),
            },
            ModelSpec {
                file: "as3.gltf".into(),
                link_name: "as3".into(),
                position: Some([0.0, 0.8, 1.0]),
                rotation_deg: Some(deg90),
                scale: Some([0.03, 0.03, 0.03]),
                visibility: Some(1.0),
                camera_pose: Some(PoseData {
                    target: [1.8, 1.1, 1.0],
                    yaw_deg: 180.0,
                    pitch_deg: 85.0,
                    radius: 6.0,
                }),
            },
            ModelSpec {
                file: "robot.gltf".into(),
                link_name: "robot".into(),
                position: Some([0.0, 0.0, 0.0]),
                rotation_deg: Some(deg90),
                scale: Some([1.0, 1.0, 1.0]),
                visibility: Some(1.0),
                camera_pose: None,
            },
        ];

        let overrides = vec![MeshOverride {
            node_name: "JAVASCRIPT_5".into(),
            link_name: "js".into(),
            visibility: Some(1.0),
            camera_pose: Some(PoseData {
                target: [0.4, 3.5, -0.3],
                yaw_deg: 170.0,
                pitch_deg: 85.0,
                radius: 6.0,
            }),
        }];

        let tooltips = vec![
            TooltipSpec { link_name: "css".into(), anchor_node: "Object_5".into(), text: "CSS3".into() },
            TooltipSpec { link_name: "react".into(), anchor_node: "react".into(), text: "React".into() },
            TooltipSpec { link_name: "js".into(), anchor_node: "Object_22".into(), text: "JavaScript".into() },
            TooltipSpec { link_name: "as3".into(), anchor_node: "as3".into(), text: "ActionScript 3".into() },
            TooltipSpec {
                link_name: "html".into(),
                anchor_node: "Plane.002_five_0".into(),
                text: "HTML5".into(),
            },
            TooltipSpec { link_name: "git".into(), anchor_node: "git".into(), text: "Git".into() },
            TooltipSpec { link_name: "vscode".into(), anchor_node: "vscode".into(), text: "VS Code".into() },
        ];

        let mut groups = BTreeMap::new();
        groups.insert(
            "programming".to_string(),
            vec!["css".into(), "html".into(), "react".into(), "js".into(), "logos".into(), "as3".into()],
        );
        groups.insert("versionControl".to_string(), vec!["git".into(), "commitModel".into()]);
        groups.insert("programmingTools".to_string(), vec!["vscode".into(), "sublime".into()]);
        groups.insert("graphicTools".to_string(), vec!["vectorDesk".into()]);
        groups.insert("neuro".to_string(), vec!["neuro".into()]);
        groups.insert("common".to_string(), vec!["robot".into()]);

        let mut commits = BTreeMap::new();
        commits.insert(
            "commit1".to_string(),
            CommitSpec {
                message: "init".into(),
                parent: String::new(),
                position: Some([0.0, 0.3, 0.0]),
                offset: None,
                visibility: Some(1.0),
            },
        );
        commits.insert(
            "commit2".to_string(),
            CommitSpec {
                message: "layout".into(),
                parent: "commit1".into(),
                position: None,
                offset: None,
                visibility: Some(1.0),
            },
        );
        commits.insert(
            "commit3".to_string(),
            CommitSpec {
                message: "models".into(),
                parent: "commit2".into(),
                position: None,
                offset: None,
                visibility: Some(1.0),
            },
        );
        commits.insert(
            "commit4".to_string(),
            CommitSpec {
                message: "feature".into(),
                parent: "commit2".into(),
                position: None,
                offset: Some([0.0, 0.0, 0.6]),
                visibility: Some(1.0),
            },
        );
        commits.insert(
            "commit5".to_string(),
            CommitSpec {
                message: "tooltips".into(),
                parent: "commit3".into(),
                position: None,
                offset: None,
                visibility: Some(0.0),
            },
        );
        commits.insert(
            "commit6".to_string(),
            CommitSpec {
                message: "merge".into(),
                parent: "commit5".into(),
                position: None,
                offset: None,
                visibility: Some(0.0),
            },
        );
        commits.insert(
            "commit7".to_string(),
            CommitSpec {
                message: "release".into(),
                parent: "commit4".into(),
                position: None,
                offset: Some([0.0, 0.6, -0.6]),
                visibility: Some(0.0),
            },
        );

        let commit_actions = vec![
            CommitAction { name: "commit".into(), nodes: vec!["commit5".into()] },
            CommitAction { name: "merge".into(), nodes: vec!["commit6".into(), "commit7".into()] },
        ];

        let skills = vec![
            SkillGroup {
                title: "Frontend development".into(),
                items: vec![
                    SkillItem { name: "HTML".into(), level: 70, link_name: Some("html".into()) },
                    SkillItem { name: "CSS".into(), level: 75, link_name: Some("css".into()) },
                    SkillItem { name: "JavaScript".into(), level: 95, link_name: Some("js".into()) },
                    SkillItem { name: "React".into(), level: 60, link_name: Some("react".into()) },
                    SkillItem { name: "AS3".into(), level: 95, link_name: Some("as3".into()) },
                ],
                group_link: Some("programming".into()),
            },
            SkillGroup {
                title: "Version control".into(),
                items: vec![SkillItem { name: "Git".into(), level: 70, link_name: Some("git".into()) }],
                group_link: Some("versionControl".into()),
            },
            SkillGroup {
                title: "Development tools".into(),
                items: vec![
                    SkillItem {
                        name: "Visual Studio Code".into(),
                        level: 95,
                        link_name: Some("vscode".into()),
                    },
                    SkillItem { name: "Sublime Text".into(), level: 95, link_name: None },
                ],
                group_link: Some("programmingTools".into()),
            },
            SkillGroup {
                title: "Graphic design".into(),
                items: vec![
                    SkillItem { name: "Corel Draw".into(), level: 80, link_name: None },
                    SkillItem { name: "Photoshop".into(), level: 60, link_name: None },
                    SkillItem { name: "Illustrator".into(), level: 60, link_name: None },
                    SkillItem { name: "Figma".into(), level: 30, link_name: None },
                ],
                group_link: Some("graphicTools".into()),
            },
            SkillGroup {
                title: "Neural networks".into(),
                items: vec![SkillItem {
                    name: "Generative AI for text and images".into(),
                    level: 70,
                    link_name: None,
                }],
                group_link: Some("neuro".into()),
            },
        ];

        let soft_skills = vec![
            "Communication and teamwork".to_string(),
            "Delivering under tight deadlines".to_string(),
            "Ownership and follow-through".to_string(),
            "Fast adoption of new tools".to_string(),
        ];

        let idle_models: Vec<String> =
            ["css", "html", "logos", "react", "git", "vscode", "as3"].map(String::from).to_vec();
        let pickable_models = idle_models.clone();
        let billboard_models = vec!["react".to_string()];

        let boards = vec![SketchBoardSpec {
            name: "vectorDesk".into(),
            position: [0.0, 2.5, 0.0],
            rotation_deg: [0.0, 0.0, 350.0],
            box_size: [0.1, 3.0, 4.0],
        }];

        StageContent {
            models,
            overrides,
            tooltips,
            groups,
            commits,
            commit_actions,
            skills,
            soft_skills,
            idle_models,
            billboard_models,
            pickable_models,
            boards,
            starting_camera: PoseData {
                target: [-1.0, 2.5, 0.0],
                yaw_deg: 180.0,
                pitch_deg: 80.0,
                radius: 6.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_groups_cover_declared_models() {
        let content = StageContent::builtin();
        for model in &content.models {
            let group = content.group_of(&model.link_name);
            assert!(
                content.groups.contains_key(&group) || group == "common",
                "model {} resolved to unknown group {group}",
                model.link_name
            );
        }
    }

    #[test]
    fn skill_link_flat_lookup() {
        let content = StageContent::builtin();
        assert_eq!(content.skill_link("React"), Some("react"));
        assert_eq!(content.skill_link("Sublime Text"), None);
        assert_eq!(content.skill_link("nope"), None);
    }

    #[test]
    fn root_commits_carry_positions() {
        let content = StageContent::builtin();
        for (id, commit) in &content.commits {
            if commit.parent.is_empty() {
                assert!(commit.position.is_some(), "root commit {id} needs an absolute position");
            } else {
                assert!(content.commits.contains_key(&commit.parent), "commit {id} has unknown parent");
            }
        }
    }
}
