//! Configuration file loading and parsing.
//!
//! Books are described by an mkdocs-style `mkdocs.yml`. Only `docs_dir`, `nav`
//! and `site_url` are required; everything this tool needs beyond that lives in
//! the `text-forge` entry of the `plugins` list and falls back to defaults.

use crate::errors::ForgeError;
use crate::nav::NavNode;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the plugin entry holding tool options.
pub const PLUGIN_NAME: &str = "text-forge";

/// Fully resolved book configuration.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Path of the file this configuration was read from.
    pub config_path: PathBuf,
    /// Content root, resolved against the config file's directory.
    pub docs_dir: PathBuf,
    pub nav: Vec<NavNode>,
    /// Canonical base URL, always ending in `/`.
    pub site_url: String,
    /// `site_url` as written in the config, trimmed.
    pub raw_site_url: String,
    pub site_name: Option<String>,
    pub site_description: Option<String>,
    pub site_author: Option<String>,
    pub copyright: Option<String>,
    pub use_directory_urls: bool,
    /// `theme.language`, used for localized edition dates.
    pub language: Option<String>,
    pub options: ForgeOptions,
}

/// Options read from the `text-forge` plugin entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForgeOptions {
    /// Block type to default caption text.
    pub block_captions: BTreeMap<String, String>,
    /// Class attached to generated caption headings.
    pub caption_class: String,
    /// Text of the link replacing `details` block bodies.
    pub details_link_text: String,
    pub chapter_dates: DateLabels,
    /// Fall back to git history when front-matter has no dates.
    pub git_dates: bool,
    pub epub_title: String,
    pub epub_subtitle: String,
    pub epub_author: String,
    pub epub_identifier: String,
    pub epub_publisher: String,
    pub epub_rights: String,
}

impl Default for ForgeOptions {
    fn default() -> Self {
        Self {
            block_captions: BTreeMap::new(),
            caption_class: "block-caption".to_string(),
            details_link_text: "Read on the website".to_string(),
            chapter_dates: DateLabels::default(),
            git_dates: true,
            epub_title: String::new(),
            epub_subtitle: String::new(),
            epub_author: String::new(),
            epub_identifier: String::new(),
            epub_publisher: String::new(),
            epub_rights: String::new(),
        }
    }
}

/// Labels printed in front of each generated chapter date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DateLabels {
    pub created: String,
    pub published: String,
    pub updated: String,
}

impl Default for DateLabels {
    fn default() -> Self {
        Self {
            created: "Created".to_string(),
            published: "Published".to_string(),
            updated: "Updated".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    docs_dir: Option<String>,
    nav: Option<Value>,
    site_url: Option<String>,
    site_name: Option<String>,
    site_description: Option<String>,
    site_author: Option<String>,
    copyright: Option<String>,
    use_directory_urls: Option<bool>,
    theme: Option<Value>,
    plugins: Option<Value>,
}

impl BookConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ForgeError> {
        let text = std::fs::read_to_string(path).map_err(|e| ForgeError::io(path, e))?;
        Self::from_yaml_str(&text, path)
    }

    /// Parse configuration text; relative paths resolve against `path`'s directory.
    pub fn from_yaml_str(text: &str, path: &Path) -> Result<Self, ForgeError> {
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| ForgeError::configuration(path, format!("invalid YAML: {}", e)))?;
        let raw: RawConfig = serde_yaml::from_value(resolve_tags(value))
            .map_err(|e| ForgeError::configuration(path, e.to_string()))?;

        let docs_dir = raw
            .docs_dir
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| ForgeError::configuration(path, "missing required field 'docs_dir'"))?;
        let nav_value = raw
            .nav
            .ok_or_else(|| ForgeError::configuration(path, "missing required field 'nav'"))?;
        let site_url = raw
            .site_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ForgeError::configuration(path, "missing required field 'site_url'"))?;

        let nav = NavNode::parse_list(&nav_value)
            .map_err(|reason| ForgeError::configuration(path, format!("nav: {}", reason)))?;

        let base_dir = path.parent().unwrap_or(Path::new(""));
        let options = match find_plugin_options(raw.plugins.as_ref()) {
            Some(Value::Null) | None => ForgeOptions::default(),
            Some(opts) => serde_yaml::from_value(opts.clone()).map_err(|e| {
                ForgeError::configuration(path, format!("plugins.{}: {}", PLUGIN_NAME, e))
            })?,
        };

        Ok(Self {
            config_path: path.to_path_buf(),
            docs_dir: base_dir.join(docs_dir),
            nav,
            site_url: with_trailing_slash(site_url.clone()),
            raw_site_url: site_url,
            site_name: non_empty(raw.site_name),
            site_description: non_empty(raw.site_description),
            site_author: non_empty(raw.site_author),
            copyright: non_empty(raw.copyright),
            use_directory_urls: raw.use_directory_urls.unwrap_or(true),
            language: raw.theme.as_ref().and_then(theme_language),
            options,
        })
    }

    /// Public URL of a page given its path relative to `docs_dir`.
    ///
    /// Follows mkdocs URL rules: `a/b.md` maps to `a/b/` with directory URLs
    /// and to `a/b.html` without; `index.md` maps to its directory.
    pub fn page_url(&self, rel_path: &Path) -> String {
        let rel = rel_path.to_string_lossy().replace('\\', "/");
        let stem = rel
            .strip_suffix(".md")
            .or_else(|| rel.strip_suffix(".markdown"))
            .unwrap_or(&rel);

        let page = if stem == "index" || stem == "README" {
            String::new()
        } else if let Some(dir) = stem
            .strip_suffix("/index")
            .or_else(|| stem.strip_suffix("/README"))
        {
            format!("{}/", dir)
        } else if self.use_directory_urls {
            format!("{}/", stem)
        } else {
            format!("{}.html", stem)
        };

        format!("{}{}", self.site_url, page)
    }
}

/// Resolve `!ENV` tags and drop every other custom tag, keeping its value.
fn resolve_tags(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => {
            let is_env = tagged.tag.to_string().trim_start_matches('!') == "ENV";
            let inner = resolve_tags(tagged.value);
            if is_env {
                resolve_env(inner)
            } else {
                inner
            }
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(resolve_tags).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (resolve_tags(k), resolve_tags(v)))
                .collect(),
        ),
        other => other,
    }
}

/// `!ENV NAME` or `!ENV [NAME, OTHER, default]`: first set variable wins,
/// the last list item is the literal default.
fn resolve_env(value: Value) -> Value {
    let lookup = |name: &Value| {
        name.as_str()
            .and_then(|n| std::env::var(n).ok())
            .map(Value::String)
    };

    match value {
        Value::Sequence(items) => {
            let Some((default, names)) = items.split_last() else {
                return Value::Null;
            };
            names
                .iter()
                .find_map(lookup)
                .or_else(|| lookup(default))
                .unwrap_or_else(|| default.clone())
        }
        scalar => lookup(&scalar).unwrap_or(Value::Null),
    }
}

/// Locate the plugin entry in either list or mapping form.
fn find_plugin_options(plugins: Option<&Value>) -> Option<&Value> {
    match plugins? {
        Value::Sequence(items) => items.iter().find_map(|item| match item {
            Value::Mapping(map) => map.get(PLUGIN_NAME),
            _ => None,
        }),
        Value::Mapping(map) => map.get(PLUGIN_NAME),
        _ => None,
    }
}

fn theme_language(theme: &Value) -> Option<String> {
    theme
        .get("language")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
site_name: Test Book
site_url: https://example.com/book
docs_dir: docs
nav:
  - index.md
"#;

    fn parse(text: &str) -> Result<BookConfig, ForgeError> {
        BookConfig::from_yaml_str(text, Path::new("/books/test/mkdocs.yml"))
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse(MINIMAL).unwrap();

        assert_eq!(config.docs_dir, PathBuf::from("/books/test/docs"));
        assert_eq!(config.site_url, "https://example.com/book/");
        assert_eq!(config.raw_site_url, "https://example.com/book");
        assert_eq!(config.site_name.as_deref(), Some("Test Book"));
        assert!(config.use_directory_urls);
        assert_eq!(config.nav.len(), 1);
        assert_eq!(config.options.caption_class, "block-caption");
        assert!(config.options.git_dates);
    }

    #[test]
    fn test_missing_required_fields() {
        for (field, text) in [
            ("docs_dir", "site_url: https://x.org\nnav:\n  - a.md\n"),
            ("nav", "site_url: https://x.org\ndocs_dir: docs\n"),
            ("site_url", "docs_dir: docs\nnav:\n  - a.md\n"),
        ] {
            match parse(text) {
                Err(ForgeError::Configuration { reason, .. }) => {
                    assert!(reason.contains(field), "{} not in '{}'", field, reason)
                }
                other => panic!("expected configuration error for {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_plugin_options_from_list() {
        let text = r#"
site_url: https://example.com/
docs_dir: docs
nav:
  - index.md
theme:
  name: material
  language: ru
plugins:
  - search
  - text-forge:
      git_dates: false
      details_link_text: Читать на сайте
      block_captions:
        situation: Ситуация
      chapter_dates:
        created: Создано
        published: Опубликовано
"#;
        let config = parse(text).unwrap();

        assert_eq!(config.language.as_deref(), Some("ru"));
        assert!(!config.options.git_dates);
        assert_eq!(config.options.details_link_text, "Читать на сайте");
        assert_eq!(
            config.options.block_captions.get("situation").map(String::as_str),
            Some("Ситуация")
        );
        assert_eq!(config.options.chapter_dates.created, "Создано");
        // Unset labels keep their defaults
        assert_eq!(config.options.chapter_dates.updated, "Updated");
    }

    #[test]
    fn test_plugin_without_options() {
        let text =
            "site_url: https://e.org\ndocs_dir: docs\nnav:\n  - a.md\nplugins:\n  - text-forge\n";
        let config = parse(text).unwrap();
        assert_eq!(config.options.details_link_text, "Read on the website");
    }

    #[test]
    fn test_unknown_tags_are_stripped() {
        let text = r#"
site_url: https://example.com/
docs_dir: docs
nav:
  - index.md
extra:
  analytics: !ENV TEXT_FORGE_TEST_UNSET_VAR
copyright: !ENV [TEXT_FORGE_TEST_UNSET_VAR, "© Someone"]
"#;
        let config = parse(text).unwrap();
        assert_eq!(config.copyright.as_deref(), Some("© Someone"));
    }

    #[test]
    fn test_page_url_rules() {
        let mut config = parse(MINIMAL).unwrap();

        assert_eq!(config.page_url(Path::new("index.md")), "https://example.com/book/");
        assert_eq!(
            config.page_url(Path::new("part/chapter.md")),
            "https://example.com/book/part/chapter/"
        );
        assert_eq!(
            config.page_url(Path::new("part/index.md")),
            "https://example.com/book/part/"
        );

        config.use_directory_urls = false;
        assert_eq!(
            config.page_url(Path::new("part/chapter.md")),
            "https://example.com/book/part/chapter.html"
        );
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        assert!(matches!(
            parse("nav: [unclosed"),
            Err(ForgeError::Configuration { .. })
        ));
    }
}
