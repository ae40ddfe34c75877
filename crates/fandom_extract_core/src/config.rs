use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPLATE: &str = "{{text}}\n> [Fandom]({{url}})";
pub const DEFAULT_PARAGRAPH_TEMPLATE: &str = "> {{paragraphText}}\n>\n";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const SETTINGS_PATH_ENV: &str = "FANDOM_EXTRACT_SETTINGS";
pub const DEFAULT_SETTINGS_RELATIVE_PATH: &str = ".fandom-extract/settings.toml";

/// User-configurable extraction settings.
///
/// Every key is optional on disk; anything missing falls back to the value in
/// [`Settings::default`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub wikis: Vec<String>,
    pub language: String,
    pub template: String,
    pub paragraph_template: String,
    pub should_use_paragraph_template: bool,
    pub should_bold_search_term: bool,
    pub should_link_categories: bool,
    pub search_term_is_pattern: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wikis: Vec::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            paragraph_template: DEFAULT_PARAGRAPH_TEMPLATE.to_string(),
            should_use_paragraph_template: true,
            should_bold_search_term: true,
            should_link_categories: false,
            search_term_is_pattern: false,
        }
    }
}

impl Settings {
    /// Configured wiki prefixes in query order.
    ///
    /// An empty list still yields one (blank) entry so the fetcher reports the
    /// missing configuration instead of silently finding nothing.
    pub fn wikis(&self) -> Vec<String> {
        if self.wikis.is_empty() {
            return vec![String::new()];
        }
        self.wikis.iter().map(|wiki| wiki.trim().to_string()).collect()
    }

    /// Reserved for locale-specific queries; not part of any URL yet.
    pub fn language(&self) -> &str {
        let trimmed = self.language.trim();
        if trimmed.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            trimmed
        }
    }

    /// Set a single key from its string form, as typed by a user.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "wikis" => {
                self.wikis = value
                    .split(',')
                    .map(str::trim)
                    .filter(|wiki| !wiki.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            "language" => self.language = value.trim().to_string(),
            "template" => self.template = unescape_newlines(value),
            "paragraph_template" => self.paragraph_template = unescape_newlines(value),
            "should_use_paragraph_template" => {
                self.should_use_paragraph_template = parse_flag(key, value)?
            }
            "should_bold_search_term" => self.should_bold_search_term = parse_flag(key, value)?,
            "should_link_categories" => self.should_link_categories = parse_flag(key, value)?,
            "search_term_is_pattern" => self.search_term_is_pattern = parse_flag(key, value)?,
            _ => bail!("unknown settings key: {key}"),
        }
        Ok(())
    }

    pub fn add_wiki(&mut self, wiki: &str) -> bool {
        let wiki = wiki.trim();
        if wiki.is_empty() || self.wikis.iter().any(|existing| existing == wiki) {
            return false;
        }
        self.wikis.push(wiki.to_string());
        true
    }

    pub fn remove_wiki(&mut self, wiki: &str) -> bool {
        let before = self.wikis.len();
        self.wikis.retain(|existing| existing != wiki.trim());
        self.wikis.len() != before
    }
}

/// Host-side persistence for [`Settings`].
pub trait SettingsStore {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings persisted as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings> {
        load_settings(&self.path)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        save_settings(&self.path, settings)
    }
}

/// Single writer over a settings store.
///
/// Readers take a [`Settings`] snapshot per request; every mutation goes
/// through [`SettingsHandle::update`], which persists immediately.
#[derive(Debug)]
pub struct SettingsHandle<S: SettingsStore> {
    store: S,
    current: Settings,
}

impl<S: SettingsStore> SettingsHandle<S> {
    pub fn open(store: S) -> Result<Self> {
        let current = store.load()?;
        Ok(Self { store, current })
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    pub fn snapshot(&self) -> Settings {
        self.current.clone()
    }

    /// Apply `change` and persist. Returns `true` when a write occurred.
    pub fn update<F>(&mut self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Settings) -> Result<()>,
    {
        let mut next = self.current.clone();
        change(&mut next)?;
        if next == self.current {
            return Ok(false);
        }
        self.store.save(&next)?;
        self.current = next;
        Ok(true)
    }
}

/// Load settings from a TOML file. Returns defaults if the file doesn't exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: Settings =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(settings).context("failed to serialize settings TOML")?;
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

/// Resolve the settings file: flag > env `FANDOM_EXTRACT_SETTINGS` > `<cwd>/.fandom-extract/settings.toml`.
pub fn resolve_settings_path(cwd: &Path, flag: Option<&Path>) -> (PathBuf, ValueSource) {
    resolve_settings_path_with_lookup(cwd, flag, |key| env::var(key).ok())
}

pub fn resolve_settings_path_with_lookup<F>(
    cwd: &Path,
    flag: Option<&Path>,
    lookup: F,
) -> (PathBuf, ValueSource)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = flag {
        return (absolutize(cwd, path), ValueSource::Flag);
    }
    if let Some(value) = lookup(SETTINGS_PATH_ENV) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return (absolutize(cwd, Path::new(trimmed)), ValueSource::Env);
        }
    }
    (cwd.join(DEFAULT_SETTINGS_RELATIVE_PATH), ValueSource::Default)
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("invalid boolean for {key}: {other} (expected true|false)"),
    }
}

// Shells make literal newlines awkward to pass, so `\n` is accepted instead.
fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    #[test]
    fn default_settings_match_documented_values() {
        let settings = Settings::default();
        assert!(settings.wikis.is_empty());
        assert_eq!(settings.template, "{{text}}\n> [Fandom]({{url}})");
        assert_eq!(settings.paragraph_template, "> {{paragraphText}}\n>\n");
        assert!(settings.should_use_paragraph_template);
        assert!(settings.should_bold_search_term);
        assert!(!settings.should_link_categories);
        assert!(!settings.search_term_is_pattern);
        assert_eq!(settings.language(), "en");
    }

    #[test]
    fn load_settings_returns_default_for_missing_file() {
        let settings = load_settings(Path::new("/nonexistent/settings.toml")).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_settings_merges_partial_file_with_defaults() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(
            &path,
            "wikis = [\"starwars\", \"memory-alpha\"]\nshould_link_categories = true\n",
        )
        .expect("write settings");

        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.wikis, vec!["starwars", "memory-alpha"]);
        assert!(settings.should_link_categories);
        assert!(settings.should_bold_search_term);
        assert_eq!(settings.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn load_settings_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "wikis = [\"oops\"").expect("write settings");
        let error = load_settings(&path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn save_then_load_preserves_multiline_templates() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("settings.toml");
        let mut settings = Settings::default();
        settings.add_wiki("starwars");
        settings.paragraph_template = "- {{paragraphText}}\n".to_string();

        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path).expect("load"), settings);
    }

    #[test]
    fn wikis_yields_blank_entry_when_unconfigured() {
        let settings = Settings::default();
        assert_eq!(settings.wikis(), vec![String::new()]);

        let mut settings = Settings::default();
        settings.wikis = vec![" starwars ".to_string(), "harrypotter".to_string()];
        assert_eq!(settings.wikis(), vec!["starwars", "harrypotter"]);
    }

    #[test]
    fn language_falls_back_to_english_when_blank() {
        let settings = Settings {
            language: "  ".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.language(), "en");
    }

    #[test]
    fn set_field_parses_lists_flags_and_escaped_newlines() {
        let mut settings = Settings::default();
        settings.set_field("wikis", "starwars, ,lotr").expect("wikis");
        settings
            .set_field("should_bold_search_term", "no")
            .expect("flag");
        settings
            .set_field("template", "{{text}}\\n-- {{url}}")
            .expect("template");

        assert_eq!(settings.wikis, vec!["starwars", "lotr"]);
        assert!(!settings.should_bold_search_term);
        assert_eq!(settings.template, "{{text}}\n-- {{url}}");
        assert!(settings.set_field("should_link_categories", "maybe").is_err());
        assert!(settings.set_field("colour", "blue").is_err());
    }

    #[test]
    fn add_and_remove_wiki_ignore_duplicates_and_unknowns() {
        let mut settings = Settings::default();
        assert!(settings.add_wiki("starwars"));
        assert!(!settings.add_wiki("starwars"));
        assert!(!settings.add_wiki("   "));
        assert!(!settings.remove_wiki("lotr"));
        assert!(settings.remove_wiki("starwars"));
        assert!(settings.wikis.is_empty());
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: RefCell<Vec<Settings>>,
    }

    impl SettingsStore for RecordingStore {
        fn load(&self) -> Result<Settings> {
            Ok(Settings::default())
        }

        fn save(&self, settings: &Settings) -> Result<()> {
            self.saved.borrow_mut().push(settings.clone());
            Ok(())
        }
    }

    #[test]
    fn handle_persists_each_change_and_skips_noops() {
        let mut handle = SettingsHandle::open(RecordingStore::default()).expect("open");
        let snapshot = handle.snapshot();

        let wrote = handle
            .update(|settings| {
                settings.add_wiki("starwars");
                Ok(())
            })
            .expect("update");
        assert!(wrote);
        let wrote = handle
            .update(|settings| {
                settings.add_wiki("starwars");
                Ok(())
            })
            .expect("noop update");
        assert!(!wrote);

        assert_eq!(handle.store.saved.borrow().len(), 1);
        assert_eq!(handle.current().wikis, vec!["starwars"]);
        assert!(snapshot.wikis.is_empty());
    }

    #[test]
    fn handle_keeps_previous_state_when_change_fails() {
        let mut handle = SettingsHandle::open(RecordingStore::default()).expect("open");
        let result = handle.update(|settings| settings.set_field("unknown", "1"));
        assert!(result.is_err());
        assert!(handle.store.saved.borrow().is_empty());
        assert_eq!(handle.current(), &Settings::default());
    }

    #[test]
    fn resolve_settings_path_prefers_flag_over_env() {
        let cwd = Path::new("/work");
        let (path, source) = resolve_settings_path_with_lookup(
            cwd,
            Some(Path::new("custom.toml")),
            |_| Some("/env/settings.toml".to_string()),
        );
        assert_eq!(path, PathBuf::from("/work/custom.toml"));
        assert_eq!(source, ValueSource::Flag);

        let (path, source) =
            resolve_settings_path_with_lookup(cwd, None, |_| Some("/env/settings.toml".to_string()));
        assert_eq!(path, PathBuf::from("/env/settings.toml"));
        assert_eq!(source, ValueSource::Env);

        let (path, source) = resolve_settings_path_with_lookup(cwd, None, |_| None);
        assert_eq!(path, PathBuf::from("/work/.fandom-extract/settings.toml"));
        assert_eq!(source, ValueSource::Default);
    }
}
