//! Scrapes structured assignment data out of notification email bodies.
//!
//! The notification HTML is machine-generated but not stable, so every field
//! is extracted independently and falls back to the [`NOT_FOUND`] sentinel on
//! a miss. Extraction never fails and touches no external state.

use anyhow::Result;
use regex::Regex;

/// Sentinel for a field absent from the source body. Callers must compare
/// against this, not against an empty string.
pub const NOT_FOUND: &str = "Not found";

const REDIRECT_PREFIX: &str = "https://accounts.google.com/AccountChooser?continue=";

/// Assignment data scraped from one message body.
#[derive(Debug, Clone)]
pub struct ExtractedAssignment {
    pub assignment_name: String,
    pub assignment_link: String,
    pub class_link: String,
    pub class_name: String,
    pub assignment_description: String,
    pub due_date: String,
    pub posted_date: String,
    pub posted_by: String,
}

pub struct Extractor {
    name: Regex,
    class_link: Regex,
    assignment_link: Regex,
    description_block: Regex,
    description_item: Regex,
    class_name: Regex,
    due_date: Regex,
    posted: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            name: Regex::new(r"<div>(.*?)</div>")?,
            class_link: Regex::new(
                r"href=(https://accounts\.google\.com/AccountChooser\?continue=https://classroom\.google\.com/c/[^&]+)",
            )?,
            assignment_link: Regex::new(
                r"href=(https://accounts\.google\.com/AccountChooser\?continue=https://classroom\.google\.com/c/[^&]+/a/[^&]+)",
            )?,
            description_block: Regex::new(r"(?s)<ul>(.*?)</ul>")?,
            description_item: Regex::new(r"<li>(.*?)</li>")?,
            // Positional match on the closing cell run of the class header
            // table; breaks if the mail template nests differently.
            class_name: Regex::new(r">([^<]+)</td></tr></table></a></td>")?,
            due_date: Regex::new(r"Due ([^<]+)")?,
            posted: Regex::new(r"Posted on ([^<]+) by ([^<]+)")?,
        })
    }

    /// Extract all fields from one HTML body. Each field independently
    /// degrades to the sentinel when its pattern does not match.
    pub fn extract(&self, html: &str) -> ExtractedAssignment {
        let assignment_name = capture(&self.name, html).unwrap_or_else(not_found);

        // The assignment pattern is the stricter one (.../c/<id>/a/<id>) and
        // must be tried on its own; the bare class pattern also matches
        // assignment URLs up to the first query separator.
        let assignment_link = capture(&self.assignment_link, html)
            .map(strip_redirect)
            .unwrap_or_else(not_found);
        let class_link = capture(&self.class_link, html)
            .map(strip_redirect)
            .unwrap_or_else(not_found);

        let assignment_description = self
            .description_block
            .captures(html)
            .map(|block| {
                self.description_item
                    .captures_iter(&block[1])
                    .map(|item| item[1].to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(not_found);

        let class_name = capture(&self.class_name, html).unwrap_or_else(not_found);
        let due_date = capture(&self.due_date, html).unwrap_or_else(not_found);

        // One combined pattern; if it misses, both halves stay absent.
        let (posted_date, posted_by) = match self.posted.captures(html) {
            Some(c) => (c[1].to_string(), c[2].to_string()),
            None => (not_found(), not_found()),
        };

        ExtractedAssignment {
            assignment_name,
            assignment_link,
            class_link,
            class_name,
            assignment_description,
            due_date,
            posted_date,
            posted_by,
        }
    }
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html).map(|c| c[1].to_string())
}

fn strip_redirect(link: String) -> String {
    link.strip_prefix(REDIRECT_PREFIX)
        .map(str::to_string)
        .unwrap_or(link)
}

fn not_found() -> String {
    NOT_FOUND.to_string()
}
