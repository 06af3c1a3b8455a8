//! Destination naming
//!
//! Renders a resolved timestamp through a category's name template and
//! assembles the destination path:
//! `root / render(timestamp) + label + [-suffix] + .extension`
//!
//! Templates use moment-style tokens (`YYYY`, `MM`, `DD`, `HH`, `mm`, `ss`, ...).
//! Anything else is copied through, so a template such as `YYYY/YYYY-MM` expands
//! into nested directories. Text inside `[brackets]` is always literal.

use crate::config::CategoryConfig;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Token pattern, longest alternatives first
static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn token_pattern() -> &'static Regex {
    TOKEN_PATTERN.get_or_init(|| {
        Regex::new(r"\[[^\]]*\]|YYYY|YY|MMMM|MMM|MM|M|DD|D|HH|H|hh|h|mm|m|ss|s|A|a").unwrap()
    })
}

/// chrono strftime equivalent of a template token
fn strftime_for(token: &str) -> &'static str {
    match token {
        "YYYY" => "%Y",
        "YY" => "%y",
        "MMMM" => "%B",
        "MMM" => "%b",
        "MM" => "%m",
        "M" => "%-m",
        "DD" => "%d",
        "D" => "%-d",
        "HH" => "%H",
        "H" => "%-H",
        "hh" => "%I",
        "h" => "%-I",
        "mm" => "%M",
        "m" => "%-M",
        "ss" => "%S",
        "s" => "%-S",
        "A" => "%p",
        "a" => "%P",
        _ => unreachable!("token pattern only yields known tokens"),
    }
}

/// A parsed name template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    template: String,
    strftime: String,
}

impl NameTemplate {
    /// Parse a moment-style template into its strftime form
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |message: &str| Error::Template {
            template: template.to_string(),
            message: message.to_string(),
        };

        if template.trim().is_empty() {
            return Err(invalid("template is empty"));
        }
        if template
            .split(['/', '\\'])
            .any(|part| part.replace(['[', ']'], "").trim() == "..")
        {
            return Err(invalid("parent directory components are not allowed"));
        }

        let mut strftime = String::with_capacity(template.len() * 2);
        let mut last = 0;

        for token in token_pattern().find_iter(template) {
            push_literal(&mut strftime, &template[last..token.start()])
                .map_err(|_| invalid("unterminated '['"))?;

            let text = token.as_str();
            if let Some(literal) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                push_escaped(&mut strftime, literal);
            } else {
                strftime.push_str(strftime_for(text));
            }
            last = token.end();
        }
        push_literal(&mut strftime, &template[last..]).map_err(|_| invalid("unterminated '['"))?;

        Ok(Self {
            template: template.to_string(),
            strftime,
        })
    }

    /// The template as written
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render a timestamp through this template
    pub fn render(&self, timestamp: &NaiveDateTime) -> String {
        timestamp.format(&self.strftime).to_string()
    }
}

/// Copy text outside of tokens; a stray '[' means a bracket was never closed
fn push_literal(out: &mut String, text: &str) -> std::result::Result<(), ()> {
    if text.contains('[') {
        return Err(());
    }
    push_escaped(out, text);
    Ok(())
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

/// A destination path together with the dedupe suffix that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationCandidate {
    pub path: PathBuf,
    /// `None` for the first candidate, then 2, 3, ...
    pub dedupe_suffix: Option<u32>,
}

/// Build the destination candidate for a timestamp.
///
/// `extension` is the lowercased extension without the dot; an empty
/// extension adds nothing.
pub fn destination(
    timestamp: &NaiveDateTime,
    config: &CategoryConfig,
    extension: &str,
    dedupe_suffix: Option<u32>,
) -> DestinationCandidate {
    let rendered = config.template.render(timestamp);
    let mut name = rendered.trim_start_matches(['/', '\\']).to_string();

    name.push_str(&config.label);
    if let Some(suffix) = dedupe_suffix {
        name.push('-');
        name.push_str(&suffix.to_string());
    }
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }

    DestinationCandidate {
        path: config.destination.join(name),
        dedupe_suffix,
    }
}
