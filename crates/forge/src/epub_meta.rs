//! EPUB metadata templating.
//!
//! Fills `[placeholder]` tokens in a metadata template (usually pandoc's
//! `book_meta.yml`) from the book configuration.

use crate::config::BookConfig;
use crate::errors::ForgeError;
use crate::history::GitHistory;
use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\[[a-z_]+\]").expect("placeholder regex is valid"))
}

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Genitive month names, as used in Russian dates ("29 января 2026").
const MONTHS_RU: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Values substituted into the metadata template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpubMetadata {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub identifier: String,
    pub publisher: String,
    pub rights: String,
    pub edition: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl EpubMetadata {
    /// Collect metadata from the config; `epub_*` options win over site fields.
    pub fn from_config(config: &BookConfig, edition: impl Into<String>, date: NaiveDate) -> Self {
        let opts = &config.options;
        let pick = |primary: &str, fallback: Option<&String>| -> Option<String> {
            let primary = primary.trim();
            if primary.is_empty() {
                fallback.cloned()
            } else {
                Some(primary.to_string())
            }
        };
        let site_url = config.site_url.trim_end_matches('/');

        Self {
            title: pick(&opts.epub_title, config.site_name.as_ref())
                .unwrap_or_else(|| "Book".to_string()),
            subtitle: pick(&opts.epub_subtitle, config.site_description.as_ref())
                .unwrap_or_default(),
            author: pick(&opts.epub_author, config.site_author.as_ref()).unwrap_or_default(),
            identifier: pick(&opts.epub_identifier, None)
                .unwrap_or_else(|| config.raw_site_url.clone()),
            publisher: pick(&opts.epub_publisher, config.site_author.as_ref())
                .unwrap_or_else(|| "Publisher".to_string()),
            rights: pick(&opts.epub_rights, config.copyright.as_ref())
                .unwrap_or_else(|| format!("<a href=\"{}\">{}</a>", site_url, site_url)),
            edition: edition.into(),
            date: date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Substitute every known placeholder in `template`.
    ///
    /// Fails if any `[lowercase]` token is left over; `template_path` only
    /// names the template in the error.
    pub fn render(&self, template: &str, template_path: &Path) -> Result<String, ForgeError> {
        let replacements = [
            ("[title]", &self.title),
            ("[subtitle]", &self.subtitle),
            ("[author]", &self.author),
            ("[identifier]", &self.identifier),
            ("[publisher]", &self.publisher),
            ("[rights]", &self.rights),
            ("[edition]", &self.edition),
            ("[date]", &self.date),
        ];

        let text = replacements
            .iter()
            .fold(template.to_string(), |text, (placeholder, value)| {
                text.replace(placeholder, value)
            });

        let leftovers: BTreeSet<String> = placeholder_regex()
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect();
        if !leftovers.is_empty() {
            return Err(ForgeError::Template {
                path: template_path.to_path_buf(),
                placeholders: leftovers.into_iter().collect(),
            });
        }

        Ok(text)
    }
}

/// Day and month name for an edition line, e.g. `05 января 2026`.
pub fn format_edition_date(date: NaiveDate, language: Option<&str>) -> String {
    let month_index = date.month0() as usize;
    let month = match language.map(|l| l.split(['-', '_']).next().unwrap_or(l)) {
        Some("ru") => MONTHS_RU[month_index],
        _ => MONTHS_EN[month_index],
    };
    format!("{:02} {} {}", date.day(), month, date.year())
}

/// `<tag>, <date>`, the edition line printed in the book.
pub fn edition_string(tag: &str, date: NaiveDate, language: Option<&str>) -> String {
    format!("{}, {}", tag, format_edition_date(date, language))
}

/// Edition tag and date from the book's git repository.
///
/// Without a repository the tag is `dev` and the date is today.
pub fn edition_from_git(config: &BookConfig) -> (String, NaiveDate) {
    let base = config
        .config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    match GitHistory::discover(base) {
        Some(git) => (
            git.describe().unwrap_or_else(|| "dev".to_string()),
            git.last_commit_date()
                .unwrap_or_else(|| Local::now().date_naive()),
        ),
        None => ("dev".to_string(), Local::now().date_naive()),
    }
}
