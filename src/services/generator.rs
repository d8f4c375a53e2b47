//! AI content generation for an edition
//!
//! Fires one chat-completion call per section and writes results onto the
//! edition row as they are produced. A transport failure aborts the
//! remaining sections; fields already written stay written. Malformed JSON
//! from the model degrades to a raw-text wrapper instead of failing.

use crate::clients::chat::ChatClient;
use crate::db::models::{edition_status, Article, Edition, Story};
use crate::db::Store;
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// One "worth watching" blurb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorthWatchingSection {
    pub title: String,
    pub content: String,
}

/// The four blurbs attached to an edition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorthWatching {
    pub trends: WorthWatchingSection,
    pub events: WorthWatchingSection,
    pub spotlight: WorthWatchingSection,
    pub policy: WorthWatchingSection,
}

#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub edition_id: Uuid,
    pub editor_note: bool,
    pub worth_watching: bool,
    pub subjects: bool,
    pub summaries: usize,
}

const SYSTEM_PROMPT: &str = "You are the newsletter editor of a daily news site. \
Write tight, concrete copy. Never invent facts beyond the provided headlines.";

pub struct GeneratorService {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl GeneratorService {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }

    /// Generate all sections for a draft edition.
    pub async fn generate(&self, edition_id: Uuid) -> Result<GenerationReport, AppError> {
        let start = Instant::now();

        let edition = self
            .store
            .find_edition(edition_id)
            .await?
            .ok_or_else(|| crate::not_found!("edition", edition_id))?;

        if edition.status != edition_status::DRAFT {
            return Err(AppError::ValidationError(format!(
                "edition {} is {}, content is frozen",
                edition_id, edition.status
            )));
        }

        let stories = self.store.stories_with_articles(edition_id).await?;
        let titles: Vec<String> = stories
            .iter()
            .filter_map(|(_, article)| article.as_ref().map(|a| a.title.clone()))
            .collect();

        let hero_title = self.hero_title(&edition).await?;

        // 1. Editor's note
        let note = self
            .chat
            .complete(SYSTEM_PROMPT, &build_editor_note_prompt(&hero_title, &titles))
            .await?;
        let note = note.trim();
        self.store.set_editor_note(edition_id, note).await?;
        metrics::counter!("newsdesk_generation_calls_total").increment(1);

        // 2. Worth watching (four subsections, then one JSON write)
        let mut sections = Vec::with_capacity(WORTH_WATCHING_KINDS.len());
        for (kind, default_title) in WORTH_WATCHING_KINDS {
            let raw = self
                .chat
                .complete(SYSTEM_PROMPT, &build_section_prompt(kind, &titles))
                .await?;
            metrics::counter!("newsdesk_generation_calls_total").increment(1);
            sections.push(parse_section(&raw, default_title));
        }
        let worth_watching = WorthWatching {
            trends: sections[0].clone(),
            events: sections[1].clone(),
            spotlight: sections[2].clone(),
            policy: sections[3].clone(),
        };
        self.store
            .set_worth_watching(
                edition_id,
                serde_json::to_value(&worth_watching)
                    .map_err(|e| AppError::InternalError(e.into()))?,
            )
            .await?;

        // 3. Subject-line pair
        let raw = self
            .chat
            .complete(SYSTEM_PROMPT, &build_subjects_prompt(&hero_title, &titles))
            .await?;
        metrics::counter!("newsdesk_generation_calls_total").increment(1);
        let (subject_a, subject_b) = parse_subjects(&raw, &hero_title);
        self.store
            .set_subjects(edition_id, &subject_a, &subject_b)
            .await?;

        // 4. Per-story one-line summaries
        let mut summaries = 0usize;
        for (story, article) in &stories {
            if story.summary.is_some() {
                continue;
            }
            let Some(article) = article else { continue };
            let summary = self.summarize_story(story, article).await?;
            self.store.set_story_summary(story.id, &summary).await?;
            summaries += 1;
        }

        tracing::info!(
            edition_id = %edition_id,
            summaries,
            total_ms = start.elapsed().as_millis(),
            "Edition content generated"
        );

        Ok(GenerationReport {
            edition_id,
            editor_note: true,
            worth_watching: true,
            subjects: true,
            summaries,
        })
    }

    async fn hero_title(&self, edition: &Edition) -> Result<String, AppError> {
        let Some(hero_id) = edition.hero_article_id else {
            return Err(crate::not_found!("hero article", edition.id));
        };
        let hero = self
            .store
            .find_article(hero_id)
            .await?
            .ok_or_else(|| crate::not_found!("article", hero_id))?;
        Ok(hero.title)
    }

    async fn summarize_story(&self, story: &Story, article: &Article) -> Result<String, AppError> {
        let raw = self
            .chat
            .complete(
                SYSTEM_PROMPT,
                &build_summary_prompt(&article.title, article.excerpt.as_deref()),
            )
            .await?;
        metrics::counter!("newsdesk_generation_calls_total").increment(1);
        tracing::debug!(story_id = %story.id, "Story summary generated");
        Ok(first_line(&raw).to_string())
    }
}

const WORTH_WATCHING_KINDS: [(&str, &str); 4] = [
    ("trends", "Trends to Watch"),
    ("events", "Upcoming Events"),
    ("spotlight", "Spotlight"),
    ("policy", "Policy Corner"),
];

pub fn build_editor_note_prompt(hero_title: &str, titles: &[String]) -> String {
    format!(
        "Write the editor's note for today's edition in 60 to 80 words. \
         Do not open with the phrase \"This week\". Lead story: {}. \
         Also covered: {}. Return plain text only, no heading.",
        hero_title,
        titles.join("; ")
    )
}

pub fn build_section_prompt(kind: &str, titles: &[String]) -> String {
    format!(
        "Write the \"{}\" blurb for today's newsletter based on these \
         headlines: {}. Respond with JSON of the shape \
         {{\"title\": \"...\", \"content\": \"...\"}} where content is \
         two or three sentences.",
        kind,
        titles.join("; ")
    )
}

pub fn build_subjects_prompt(hero_title: &str, titles: &[String]) -> String {
    format!(
        "Write two alternative email subject lines for an edition led by \
         \"{}\" and also covering: {}. Keep each under 60 characters. \
         Respond with JSON of the shape \
         {{\"subject_a\": \"...\", \"subject_b\": \"...\"}}.",
        hero_title,
        titles.join("; ")
    )
}

pub fn build_summary_prompt(title: &str, excerpt: Option<&str>) -> String {
    match excerpt {
        Some(excerpt) => format!(
            "Write a one-line teaser (max 20 words) for the article \
             \"{}\". Excerpt: {}. Return the line only.",
            title, excerpt
        ),
        None => format!(
            "Write a one-line teaser (max 20 words) for the article \
             \"{}\". Return the line only.",
            title
        ),
    }
}

/// Parse a worth-watching response, degrading to a raw-text wrapper when
/// the model did not return the requested JSON shape.
pub fn parse_section(raw: &str, default_title: &str) -> WorthWatchingSection {
    let cleaned = strip_code_fence(raw.trim());
    match serde_json::from_str::<WorthWatchingSection>(cleaned) {
        Ok(section) if !section.content.is_empty() => section,
        _ => WorthWatchingSection {
            title: default_title.to_string(),
            content: cleaned.to_string(),
        },
    }
}

#[derive(Deserialize)]
struct SubjectPair {
    subject_a: String,
    subject_b: String,
}

/// Parse the subject-line pair; on failure subject A falls back to the raw
/// first line and subject B to the hero title.
pub fn parse_subjects(raw: &str, hero_title: &str) -> (String, String) {
    let cleaned = strip_code_fence(raw.trim());
    match serde_json::from_str::<SubjectPair>(cleaned) {
        Ok(pair) if !pair.subject_a.is_empty() && !pair.subject_b.is_empty() => {
            (pair.subject_a, pair.subject_b)
        }
        _ => (first_line(cleaned).to_string(), hero_title.to_string()),
    }
}

/// Models frequently wrap JSON in a markdown fence; strip it.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn first_line(raw: &str) -> &str {
    raw.trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim_matches('"')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_section_valid_json() {
        let raw = r#"{"title": "Trends", "content": "Rates keep climbing."}"#;
        let section = parse_section(raw, "Trends to Watch");
        assert_eq!(section.title, "Trends");
        assert_eq!(section.content, "Rates keep climbing.");
    }

    #[test]
    fn test_parse_section_fenced_json() {
        let raw = "```json\n{\"title\": \"T\", \"content\": \"C\"}\n```";
        let section = parse_section(raw, "Fallback");
        assert_eq!(section.title, "T");
    }

    #[test]
    fn test_parse_section_malformed_degrades() {
        let raw = "Here are some trends worth watching this week.";
        let section = parse_section(raw, "Trends to Watch");
        assert_eq!(section.title, "Trends to Watch");
        assert_eq!(section.content, raw);
    }

    #[test]
    fn test_parse_subjects_valid() {
        let raw = r#"{"subject_a": "One", "subject_b": "Two"}"#;
        let (a, b) = parse_subjects(raw, "Hero");
        assert_eq!(a, "One");
        assert_eq!(b, "Two");
    }

    #[test]
    fn test_parse_subjects_fallback() {
        let raw = "Big news today!\nAnd more.";
        let (a, b) = parse_subjects(raw, "Hero headline");
        assert_eq!(a, "Big news today!");
        assert_eq!(b, "Hero headline");
    }

    #[test]
    fn test_editor_note_prompt_forbids_this_week() {
        let prompt = build_editor_note_prompt("Hero", &["A".into(), "B".into()]);
        assert!(prompt.contains("This week"));
        assert!(prompt.contains("60 to 80 words"));
        assert!(prompt.contains("Hero"));
    }

    #[test]
    fn test_first_line_strips_quotes() {
        assert_eq!(first_line("\"A teaser line.\"\nextra"), "A teaser line.");
    }

    #[tokio::test]
    async fn test_generate_writes_all_sections() {
        use crate::clients::chat::MockChatClient;
        use crate::db::store::{draft_edition, MockStore};
        use crate::db::models::Article;

        let hero = Article {
            id: Uuid::new_v4(),
            title: "Hero headline".to_string(),
            slug: "hero-headline".to_string(),
            excerpt: None,
            category: "local".to_string(),
            image_url: None,
            view_count: 0,
            like_count: 0,
            published_at: Some(chrono::Utc::now().into()),
            created_at: chrono::Utc::now().into(),
        };
        let edition_id = Uuid::new_v4();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        let store = Arc::new(MockStore::default());
        *store.edition.lock().unwrap() = Some(draft_edition(edition_id, date, Some(hero.id)));
        store.articles.lock().unwrap().push(hero);

        // note, four sections, subjects; no stories so no summary calls
        let chat = Arc::new(MockChatClient::with_responses(vec![
            "A short editor's note.",
            r#"{"title": "Trends", "content": "T"}"#,
            r#"{"title": "Events", "content": "E"}"#,
            r#"{"title": "Spotlight", "content": "S"}"#,
            r#"{"title": "Policy", "content": "P"}"#,
            r#"{"subject_a": "One", "subject_b": "Two"}"#,
        ]));

        let report = GeneratorService::new(store.clone(), chat)
            .generate(edition_id)
            .await
            .unwrap();
        assert_eq!(report.summaries, 0);

        let edition = store.edition.lock().unwrap().clone().unwrap();
        assert_eq!(edition.editor_note.as_deref(), Some("A short editor's note."));
        assert_eq!(edition.subject_a.as_deref(), Some("One"));
        assert_eq!(edition.subject_b.as_deref(), Some("Two"));
        let ww: WorthWatching = serde_json::from_value(edition.worth_watching.unwrap()).unwrap();
        assert_eq!(ww.trends.title, "Trends");
        assert_eq!(ww.policy.content, "P");
    }

    #[tokio::test]
    async fn test_generate_rejects_sent_edition() {
        use crate::clients::chat::MockChatClient;
        use crate::db::models::edition_status;
        use crate::db::store::{draft_edition, MockStore};

        let edition_id = Uuid::new_v4();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut edition = draft_edition(edition_id, date, None);
        edition.status = edition_status::SENT.to_string();

        let store = Arc::new(MockStore::default());
        *store.edition.lock().unwrap() = Some(edition);

        let err = GeneratorService::new(store, Arc::new(MockChatClient::new()))
            .generate(edition_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
