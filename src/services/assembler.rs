//! Edition assembly
//!
//! Picks the hero article by trailing-window engagement, diversifies the
//! remaining top stories by category, rotates in supplementary content,
//! and persists the draft edition. A missing hero is a hard failure; a
//! duplicate edition date is a conflict.

use crate::config::AppConfig;
use crate::db::models::{Article, Edition};
use crate::db::repository::NewEdition;
use crate::db::Store;
use crate::errors::AppError;
use chrono::NaiveDate;
use std::sync::Arc;

/// Stories per edition beyond the hero
pub const MAX_TOP_STORIES: usize = 5;
/// Greedy diversification cap
pub const MAX_PER_CATEGORY: usize = 3;
/// Ranked candidates fetched from the database
const CANDIDATE_POOL: u64 = 40;

pub struct AssemblerService {
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
}

impl AssemblerService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// Assemble the edition for a calendar date.
    pub async fn assemble(&self, date: NaiveDate) -> Result<Edition, AppError> {
        if self.store.find_edition_by_date(date).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "Edition already exists for {}",
                date
            )));
        }

        let candidates = self
            .store
            .ranked_articles(self.config.newsletter.ranking_window_days, CANDIDATE_POOL)
            .await?;

        let Some(hero) = candidates.first() else {
            return Err(crate::not_found!("hero article", date));
        };

        let top_stories = pick_top_stories(&candidates[1..], MAX_TOP_STORIES, MAX_PER_CATEGORY);

        let mystery_link = self.store.next_mystery_link().await?;
        let fun_fact = self.store.next_fun_fact().await?;
        let sponsor = self.store.active_sponsor().await?;

        let edition = self
            .store
            .create_edition(NewEdition {
                edition_date: date,
                hero_article_id: hero.id,
                story_article_ids: top_stories.iter().map(|a| a.id).collect(),
                mystery_link_id: mystery_link.as_ref().map(|m| m.id),
                fun_fact_id: fun_fact.as_ref().map(|f| f.id),
                sponsor_id: sponsor.as_ref().map(|s| s.id),
            })
            .await?;

        // Consume the rotated content only once the edition row exists.
        if let Some(link) = &mystery_link {
            self.store.mark_mystery_link_used(link.id).await?;
        }
        if let Some(fact) = &fun_fact {
            self.store.mark_fun_fact_used(fact.id).await?;
        }

        metrics::counter!("newsdesk_editions_assembled_total").increment(1);
        tracing::info!(
            edition_id = %edition.id,
            edition_date = %date,
            hero_article_id = %hero.id,
            top_stories = top_stories.len(),
            "Edition assembled"
        );

        Ok(edition)
    }
}

/// Greedy selection in rank order, capped per category. The hero must not
/// be in `candidates`; the caller slices it off.
pub fn pick_top_stories(
    candidates: &[Article],
    limit: usize,
    per_category_cap: usize,
) -> Vec<&Article> {
    let mut picked: Vec<&Article> = Vec::with_capacity(limit);

    for article in candidates {
        if picked.len() == limit {
            break;
        }
        let in_category = picked
            .iter()
            .filter(|a| a.category == article.category)
            .count();
        if in_category < per_category_cap {
            picked.push(article);
        }
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::edition_status;
    use crate::db::store::{draft_edition, MockStore};
    use uuid::Uuid;

    fn article(title: &str, category: &str) -> Article {
        let now = chrono::Utc::now();
        Article {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            excerpt: None,
            category: category.to_string(),
            image_url: None,
            view_count: 0,
            like_count: 0,
            published_at: Some(now.into()),
            created_at: now.into(),
        }
    }

    #[test]
    fn test_picks_in_rank_order() {
        let candidates = vec![
            article("one", "a"),
            article("two", "b"),
            article("three", "c"),
        ];
        let picked = pick_top_stories(&candidates, 5, 3);
        let titles: Vec<_> = picked.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[test]
    fn test_category_cap_enforced() {
        let candidates = vec![
            article("s1", "sports"),
            article("s2", "sports"),
            article("s3", "sports"),
            article("s4", "sports"),
            article("p1", "politics"),
        ];
        let picked = pick_top_stories(&candidates, 5, 3);
        let sports = picked.iter().filter(|a| a.category == "sports").count();
        assert_eq!(sports, 3);
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_limit_respected() {
        let candidates: Vec<Article> = (0..10)
            .map(|i| article(&format!("a{}", i), &format!("c{}", i)))
            .collect();
        let picked = pick_top_stories(&candidates, MAX_TOP_STORIES, MAX_PER_CATEGORY);
        assert_eq!(picked.len(), 5);
    }

    #[test]
    fn test_hero_excluded_by_slicing() {
        let candidates = vec![
            article("hero", "a"),
            article("one", "a"),
            article("two", "b"),
        ];
        let hero = &candidates[0];
        let picked = pick_top_stories(&candidates[1..], MAX_TOP_STORIES, MAX_PER_CATEGORY);
        assert!(picked.iter().all(|a| a.id != hero.id));
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_empty_candidates() {
        let picked = pick_top_stories(&[], MAX_TOP_STORIES, MAX_PER_CATEGORY);
        assert!(picked.is_empty());
    }

    fn service(store: Arc<MockStore>) -> AssemblerService {
        AssemblerService::new(store, Arc::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn test_assemble_creates_draft_edition() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let store = Arc::new(MockStore::default());
        *store.articles.lock().unwrap() = vec![
            article("hero", "local"),
            article("second", "business"),
            article("third", "weather"),
        ];
        let hero_id = store.articles.lock().unwrap()[0].id;

        let edition = service(store.clone()).assemble(date).await.unwrap();

        assert_eq!(edition.status, edition_status::DRAFT);
        assert_eq!(edition.edition_date, date);
        assert_eq!(edition.hero_article_id, Some(hero_id));
        // Hero never appears among the top stories
        let stories = store.stories.lock().unwrap();
        assert_eq!(stories.len(), 2);
        assert!(stories.iter().all(|(s, _)| s.article_id != hero_id));
    }

    #[tokio::test]
    async fn test_assemble_twice_for_same_date_is_conflict() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let store = Arc::new(MockStore::default());
        *store.edition.lock().unwrap() = Some(draft_edition(Uuid::new_v4(), date, None));

        let err = service(store).assemble(date).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_assemble_without_candidates_is_not_found() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let err = service(Arc::new(MockStore::default()))
            .assemble(date)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
