use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};

const DEFAULT_WEBSITES: &[&str] = &[
    "facebook.com",
    "www.facebook.com",
    "linkedin.com",
    "www.linkedin.com",
    "discord.com",
    "www.discord.com",
    "reddit.com",
    "www.reddit.com",
    "boards.4chan.org",
    "www.4chan.org",
    "news.ycombinator.com",
    "ycombinator.com",
    "www.ycombinator.com",
    "lesswrong.com",
    "www.lesswrong.com",
    "alignmentforum.org",
    "www.alignmentforum.org",
    "bsky.app",
    "www.bsky.app",
    "x.com",
    "www.x.com",
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "api.twitter.com",
    "m.twitter.com",
];

const DEFAULT_PROCESSES: &[&str] = &["Discord.exe", "Telegram.exe", "Steam.exe"];

/// What gets blocked while a deep work session is on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blocklist {
    #[serde(default)]
    pub websites: Vec<String>,
    /// Executable names, matched case-insensitively with any `.exe` suffix ignored.
    #[serde(default)]
    pub processes: Vec<String>,
}

impl Default for Blocklist {
    fn default() -> Self {
        Self {
            websites: DEFAULT_WEBSITES.iter().map(|s| s.to_string()).collect(),
            processes: DEFAULT_PROCESSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Blocklist {
    /// Loads the blocklist from a JSON file, or the built-in defaults when no
    /// path is configured or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = existing(path) else {
            return Ok(Self::default().normalized());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read blocklist from {}", path.display()))?;
        let list: Blocklist = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse blocklist {}", path.display()))?;
        Ok(list.normalized())
    }

    /// Trims entries, drops blanks and duplicates while keeping first-seen order.
    pub fn normalized(self) -> Self {
        Self {
            websites: dedup(self.websites, |s| s.to_ascii_lowercase()),
            processes: dedup(self.processes, |s| s.to_ascii_lowercase()),
        }
    }
}

/// A configured path that is missing is reported, then treated as unset.
fn existing(path: Option<&Path>) -> Option<&Path> {
    let path = path?;
    if path.exists() {
        return Some(path);
    }
    warn!(
        "Blocklist {} not found, using the built-in list",
        path.display()
    );
    None
}

fn dedup(items: Vec<String>, key: impl Fn(&str) -> String) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(key(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let list = Blocklist::load(Some(Path::new("/nonexistent/blocklist.json"))).unwrap();
        assert_eq!(list, Blocklist::default().normalized());
        assert!(list.websites.contains(&"reddit.com".to_string()));
    }

    #[test]
    fn only_existing_paths_are_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(existing(Some(file.path())), Some(file.path()));
        assert_eq!(existing(Some(Path::new("/nonexistent/blocklist.json"))), None);
        assert_eq!(existing(None), None);
    }

    #[test]
    fn load_dedups_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        fs::write(
            &path,
            r#"{"websites": ["x.com", " X.com ", "", "reddit.com", "x.com"], "processes": ["Steam.exe"]}"#,
        )
        .unwrap();

        let list = Blocklist::load(Some(&path)).unwrap();
        assert_eq!(list.websites, vec!["x.com", "reddit.com"]);
        assert_eq!(list.processes, vec!["Steam.exe"]);
    }

    #[test]
    fn processes_default_to_empty_when_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        fs::write(&path, r#"{"websites": ["x.com"]}"#).unwrap();

        let list = Blocklist::load(Some(&path)).unwrap();
        assert!(list.processes.is_empty());
    }
}
