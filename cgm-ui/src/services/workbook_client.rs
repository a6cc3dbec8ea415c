//! Meeting workbook scraper
//!
//! Best effort only. The weekly workbook page is fetched directly and then
//! through each configured proxy; the first body that yields any content is
//! parsed. When every source fails the caller gets an empty week, never an
//! error.
//!
//! Parsing works on the page's text lines, not on its markup structure:
//! section headings switch the current section, `N. Title (M min.)` lines
//! become parts, `Song N` anywhere is a song number, and the first
//! all-capitals heading with a chapter number is the Bible reading.

use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use cgm_common::config::WorkbookConfig;
use cgm_common::db::models::AssignmentType;
use cgm_common::time::week_start;

const USER_AGENT: &str = concat!("cgm-ui/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum WorkbookClientError {
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("workbook pattern: {0}")]
    Pattern(#[from] regex::Error),
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "header", "section",
    "article", "tr", "td", "th", "title",
];

const MONTHS: &[&str] = &[
    "JANUARY", "FEBRUARY", "MARCH", "APRIL", "MAY", "JUNE", "JULY", "AUGUST", "SEPTEMBER",
    "OCTOBER", "NOVEMBER", "DECEMBER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkbookSection {
    /// Before the first section heading (opening song and comments)
    Opening,
    Treasures,
    FieldMinistry,
    Living,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookPart {
    pub number: u32,
    pub section: WorkbookSection,
    pub title: String,
    pub minutes: Option<u32>,
    pub suggested_type: Option<AssignmentType>,
}

/// What could be read from one workbook page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkbookContent {
    pub bible_reading: Option<String>,
    pub songs: Vec<u32>,
    pub parts: Vec<WorkbookPart>,
}

impl WorkbookContent {
    pub fn is_empty(&self) -> bool {
        self.bible_reading.is_none() && self.songs.is_empty() && self.parts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookWeek {
    pub week_of: NaiveDate,
    /// URL the content came from; `None` when nothing could be fetched
    pub source: Option<String>,
    #[serde(flatten)]
    pub content: WorkbookContent,
}

impl WorkbookWeek {
    pub fn empty(week_of: NaiveDate) -> Self {
        Self {
            week_of,
            source: None,
            content: WorkbookContent::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct TextLine {
    text: String,
    heading: bool,
}

fn is_heading_tag(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "rsquo" | "lsquo" => Some('\''),
        "ldquo" | "rdquo" => Some('"'),
        "ndash" | "mdash" => Some('-'),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

fn section_heading(text: &str) -> Option<WorkbookSection> {
    if text.len() > 60 {
        return None;
    }
    let upper = text.to_uppercase();
    if upper.contains("TREASURES FROM GOD") {
        Some(WorkbookSection::Treasures)
    } else if upper.contains("APPLY YOURSELF TO THE FIELD MINISTRY") {
        Some(WorkbookSection::FieldMinistry)
    } else if upper.contains("LIVING AS CHRISTIANS") {
        Some(WorkbookSection::Living)
    } else {
        None
    }
}

fn suggested_type(section: WorkbookSection, title: &str) -> Option<AssignmentType> {
    let t = title.to_lowercase();
    match section {
        WorkbookSection::Opening => None,
        WorkbookSection::Treasures => Some(if t.contains("spiritual gems") {
            AssignmentType::SpiritualGems
        } else if t.contains("bible reading") {
            AssignmentType::BibleReading
        } else {
            AssignmentType::Treasures
        }),
        WorkbookSection::FieldMinistry => {
            if t.contains("starting a conversation") {
                Some(AssignmentType::StartingConversation)
            } else if t.contains("following up") {
                Some(AssignmentType::FollowingUp)
            } else if t.contains("making disciples") {
                Some(AssignmentType::MakingDisciples)
            } else if t.contains("explaining your beliefs") {
                Some(AssignmentType::ExplainingBeliefs)
            } else if t.contains("talk") {
                Some(AssignmentType::StudentTalk)
            } else {
                None
            }
        }
        WorkbookSection::Living => Some(if t.contains("congregation bible study") {
            AssignmentType::CongregationBibleStudy
        } else {
            AssignmentType::LivingPart
        }),
    }
}

/// Compiled patterns for reading workbook pages
#[derive(Debug, Clone)]
pub struct WorkbookParser {
    /// Script and style blocks as a whole, or a single tag with its name
    tag: Regex,
    entity: Regex,
    song: Regex,
    /// `3. Starting a Conversation`
    part: Regex,
    /// `(4 min.)`
    minutes: Regex,
    /// `ISAIAH 58-59`, `1 CORINTHIANS 3-4`
    bible_reading: Regex,
}

impl WorkbookParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tag: Regex::new(
                r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<(/?)([a-z][a-z0-9]*)\b[^>]*>",
            )?,
            entity: Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});")?,
            song: Regex::new(r"\bSong (\d+)")?,
            part: Regex::new(r"^(\d{1,2})\.\s+(.+)$")?,
            minutes: Regex::new(r"(?i)\((\d+)\s*min")?,
            bible_reading: Regex::new(
                r"^(?:\d )?(\p{Lu}{2,})(?:[ \p{Lu}.]*\p{Lu})? \d[\d :,\-\x{2013}]*$",
            )?,
        })
    }

    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| match decode_entity(&caps[1]) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn flush_line(&self, lines: &mut Vec<TextLine>, current: &mut String, heading: bool) {
        let text = self
            .decode_entities(current)
            .replace('\u{a0}', " ")
            .replace(['\u{2018}', '\u{2019}'], "'")
            .replace(['\u{201c}', '\u{201d}'], "\"")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        current.clear();
        if !text.is_empty() {
            lines.push(TextLine { text, heading });
        }
    }

    /// Page text split at block-level tags, script and style dropped
    fn html_lines(&self, html: &str) -> Vec<TextLine> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut heading_depth = 0usize;
        let mut last = 0;

        for caps in self.tag.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            current.push_str(&html[last..whole.start()]);
            last = whole.end();

            // Script or style block
            let Some(name) = caps.get(2) else { continue };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

            if BLOCK_TAGS.contains(&name.as_str()) {
                self.flush_line(&mut lines, &mut current, heading_depth > 0);
            }
            if is_heading_tag(&name) {
                if closing {
                    heading_depth = heading_depth.saturating_sub(1);
                } else {
                    heading_depth += 1;
                }
            }
        }

        current.push_str(&html[last..]);
        self.flush_line(&mut lines, &mut current, heading_depth > 0);
        lines
    }

    /// The week's date line (`SEPTEMBER 2-8`) has the same shape and is skipped
    fn is_bible_reading(&self, text: &str) -> bool {
        self.bible_reading
            .captures(text)
            .is_some_and(|caps| !MONTHS.contains(&&caps[1]))
    }

    /// `3. Starting a Conversation` gives `(3, "Starting a Conversation")`
    fn numbered_part<'t>(&self, text: &'t str) -> Option<(u32, &'t str)> {
        let caps = self.part.captures(text)?;
        let number = caps[1].parse().ok()?;
        Some((number, caps.get(2)?.as_str().trim()))
    }

    /// Byte offset of the `(` and the minutes of the first `(N min.)`
    fn minutes_marker(&self, text: &str) -> Option<(usize, u32)> {
        let caps = self.minutes.captures(text)?;
        let at = caps.get(0)?.start();
        Some((at, caps[1].parse().ok()?))
    }

    /// Extract sections, parts, songs and the Bible reading from a workbook page
    pub fn parse(&self, html: &str) -> WorkbookContent {
        let lines = self.html_lines(html);
        let mut content = WorkbookContent::default();
        let mut section = WorkbookSection::Opening;

        for (index, line) in lines.iter().enumerate() {
            let text = line.text.as_str();

            if let Some(next) = section_heading(text) {
                section = next;
                continue;
            }

            content.songs.extend(
                self.song
                    .captures_iter(text)
                    .filter_map(|caps| caps[1].parse::<u32>().ok()),
            );

            if content.bible_reading.is_none() && line.heading && self.is_bible_reading(text) {
                content.bible_reading = Some(text.to_string());
                continue;
            }

            if let Some((number, rest)) = self.numbered_part(text) {
                let marker = self.minutes_marker(rest);
                // Duration is on the title line or the line right after it
                let minutes = marker.map(|(_, m)| m).or_else(|| {
                    lines
                        .get(index + 1)
                        .filter(|next| self.numbered_part(&next.text).is_none())
                        .and_then(|next| self.minutes_marker(&next.text))
                        .map(|(_, m)| m)
                });
                let title = match marker {
                    Some((at, _)) => &rest[..at],
                    None => rest,
                }
                .trim()
                .trim_end_matches(':')
                .to_string();

                content.parts.push(WorkbookPart {
                    number,
                    section,
                    suggested_type: suggested_type(section, &title),
                    title,
                    minutes,
                });
            }
        }

        content
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Fetches workbook pages, falling back through the configured proxies
#[derive(Debug, Clone)]
pub struct WorkbookClient {
    http_client: reqwest::Client,
    parser: WorkbookParser,
    config: WorkbookConfig,
}

impl WorkbookClient {
    pub fn new(config: WorkbookConfig) -> Result<Self, WorkbookClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http_client,
            parser: WorkbookParser::new()?,
            config,
        })
    }

    /// Page for the ISO week containing `date`
    pub fn week_url(&self, date: NaiveDate) -> String {
        let week = week_start(date).iso_week();
        format!(
            "{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.language.trim_matches('/'),
            week.year(),
            week.week()
        )
    }

    /// Direct URL first, then each proxy wrapping it
    pub fn candidate_urls(&self, target: &str) -> Vec<String> {
        let mut urls = vec![target.to_string()];
        for proxy in &self.config.proxies {
            match reqwest::Url::parse_with_params(&proxy.base, &[(proxy.param.as_str(), target)]) {
                Ok(url) => urls.push(url.to_string()),
                Err(e) => warn!("Skipping invalid workbook proxy {}: {}", proxy.base, e),
            }
        }
        urls
    }

    async fn fetch_text(&self, url: &str) -> Result<String, String> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response.text().await.map_err(|e| e.to_string())
    }

    /// Workbook content for the week containing `date`; empty on failure
    pub async fn fetch_week(&self, date: NaiveDate) -> WorkbookWeek {
        let week_of = week_start(date);
        let target = self.week_url(week_of);

        for url in self.candidate_urls(&target) {
            match self.fetch_text(&url).await {
                Ok(body) => {
                    let content = self.parser.parse(&body);
                    if content.is_empty() {
                        debug!(url = %url, "No workbook content found in response");
                        continue;
                    }
                    info!(
                        url = %url,
                        parts = content.parts.len(),
                        "Fetched meeting workbook for week of {}",
                        week_of
                    );
                    return WorkbookWeek {
                        week_of,
                        source: Some(url),
                        content,
                    };
                }
                Err(e) => warn!(url = %url, "Workbook fetch failed: {}", e),
            }
        }

        warn!("All workbook sources failed for week of {}", week_of);
        WorkbookWeek::empty(week_of)
    }
}
