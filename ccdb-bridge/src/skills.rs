//! Skill discovery for the `/skill` slash command.
//!
//! Scans `~/.claude/skills/` for skill directories, reading each one's
//! `SKILL.md` YAML frontmatter for a name and description. The list backs
//! the command's autocomplete and the `/skills` overview.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// One discovered skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMeta {
    pub name: String,
    pub description: String,
}

/// The default skills directory, `~/.claude/skills`.
pub fn default_skills_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join("skills"))
}

/// Scan a skills directory and return the discovered skills, sorted by
/// directory name. Missing directory yields an empty list.
pub fn load_skills(skills_dir: &Path) -> Vec<SkillMeta> {
    let Ok(entries) = std::fs::read_dir(skills_dir) else {
        warn!("Skills directory not found: {}", skills_dir.display());
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let skills: Vec<SkillMeta> = dirs
        .iter()
        .filter_map(|dir| parse_skill_meta(dir))
        .collect();

    info!("Loaded {} skill(s) from {}", skills.len(), skills_dir.display());
    skills
}

/// Read a skill directory's `SKILL.md` frontmatter.
fn parse_skill_meta(skill_dir: &Path) -> Option<SkillMeta> {
    let skill_md = skill_dir.join("SKILL.md");
    let text = match std::fs::read_to_string(&skill_md) {
        Ok(text) => text,
        Err(_) => return None,
    };

    let mut lines = text.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }

    let mut name = None;
    let mut description = String::new();
    let mut closed = false;
    for line in lines {
        if line.trim() == "---" {
            closed = true;
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "name" => name = Some(value.trim().to_string()),
            "description" => description = value.trim().to_string(),
            _ => {},
        }
    }
    if !closed {
        return None;
    }

    let fallback = skill_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Some(SkillMeta {
        name: name.filter(|n| !n.is_empty()).unwrap_or(fallback),
        description,
    })
}

/// Skill names are alphanumeric plus underscores and hyphens.
pub fn is_valid_skill_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Skills whose name or description contains the query, case-insensitively.
pub fn matching_skills<'a>(skills: &'a [SkillMeta], query: &str) -> Vec<&'a SkillMeta> {
    let query = query.to_lowercase();
    skills
        .iter()
        .filter(|skill| {
            skill.name.to_lowercase().contains(&query)
                || skill.description.to_lowercase().contains(&query)
        })
        .collect()
}

/// The dropdown label for a skill: `name — description`, with the
/// description shortened and the whole label capped at Discord's 100-char
/// choice limit.
pub fn autocomplete_label(skill: &SkillMeta) -> String {
    let label = if skill.description.is_empty() {
        skill.name.clone()
    } else {
        let mut short: String = skill.description.chars().take(60).collect();
        if skill.description.chars().count() > 60 {
            short.push('…');
        }
        format!("{} — {short}", skill.name)
    };
    label.chars().take(100).collect()
}

/// The `/skills` overview text, one bullet per skill.
pub fn skills_overview(skills: &[SkillMeta]) -> String {
    let mut lines = vec![format!(
        "**Available Claude Code skills** ({})\n",
        skills.len()
    )];
    for skill in skills {
        if skill.description.is_empty() {
            lines.push(format!("• `{}`", skill.name));
        } else {
            let mut short: String = skill.description.chars().take(60).collect();
            if skill.description.chars().count() > 60 {
                short.push('…');
            }
            lines.push(format!("• `{}` — {short}", skill.name));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_skill(root: &TempDir, dir: &str, contents: &str) {
        let path = root.path().join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("SKILL.md"), contents).unwrap();
    }

    #[test]
    fn test_load_skills_reads_frontmatter() {
        let root = TempDir::new().unwrap();
        write_skill(
            &root,
            "goodmorning",
            "---\nname: goodmorning\ndescription: Morning briefing\n---\nBody text\n",
        );
        write_skill(&root, "todoist", "---\nname: todoist\n---\n");

        let skills = load_skills(root.path());
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name, "goodmorning");
        assert_eq!(skills[0].description, "Morning briefing");
        assert_eq!(skills[1].name, "todoist");
        assert_eq!(skills[1].description, "");
    }

    #[test]
    fn test_directory_name_is_the_fallback_name() {
        let root = TempDir::new().unwrap();
        write_skill(&root, "unnamed", "---\ndescription: No name field\n---\n");
        let skills = load_skills(root.path());
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "unnamed");
    }

    #[test]
    fn test_entries_without_valid_frontmatter_are_skipped() {
        let root = TempDir::new().unwrap();
        write_skill(&root, "no-frontmatter", "Just a readme.\n");
        write_skill(&root, "unclosed", "---\nname: broken\n");
        std::fs::create_dir_all(root.path().join("empty-dir")).unwrap();
        assert!(load_skills(root.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_yields_empty_list() {
        assert!(load_skills(Path::new("/nonexistent/skills")).is_empty());
    }

    #[test]
    fn test_is_valid_skill_name() {
        assert!(is_valid_skill_name("goodmorning"));
        assert!(is_valid_skill_name("my_skill-2"));
        assert!(!is_valid_skill_name(""));
        assert!(!is_valid_skill_name("../escape"));
        assert!(!is_valid_skill_name("has space"));
    }

    #[test]
    fn test_matching_skills_searches_name_and_description() {
        let skills = vec![
            SkillMeta {
                name: "goodmorning".into(),
                description: "Morning briefing".into(),
            },
            SkillMeta {
                name: "todoist".into(),
                description: "Task sync".into(),
            },
        ];
        let by_name = matching_skills(&skills, "TODO");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "todoist");

        let by_description = matching_skills(&skills, "briefing");
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].name, "goodmorning");

        assert_eq!(matching_skills(&skills, "").len(), 2);
    }

    #[test]
    fn test_autocomplete_label_shortens_long_descriptions() {
        let skill = SkillMeta {
            name: "verbose".into(),
            description: "d".repeat(120),
        };
        let label = autocomplete_label(&skill);
        assert!(label.starts_with("verbose — "));
        assert!(label.ends_with('…'));
        assert!(label.chars().count() <= 100);
    }

    #[test]
    fn test_skills_overview_lists_every_skill() {
        let skills = vec![
            SkillMeta {
                name: "a".into(),
                description: "first".into(),
            },
            SkillMeta {
                name: "b".into(),
                description: String::new(),
            },
        ];
        let overview = skills_overview(&skills);
        assert!(overview.contains("(2)"));
        assert!(overview.contains("• `a` — first"));
        assert!(overview.contains("• `b`"));
    }
}
