//! Data-access trait for the services
//!
//! The services depend on this trait rather than on [`Repository`]
//! directly, mirroring the chat/email client seams. Production wires in
//! `Repository`; tests substitute [`MockStore`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DbErr;
use uuid::Uuid;

use super::models;
use super::models::{Article, Edition, FunFact, MysteryLink, Sponsor, Story, Subscriber};
use super::repository::{NewEdition, Repository};

#[async_trait]
pub trait Store: Send + Sync {
    // Articles
    async fn ranked_articles(&self, window_days: i64, limit: u64) -> Result<Vec<Article>, DbErr>;
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>, DbErr>;

    // Editions
    async fn find_edition(&self, id: Uuid) -> Result<Option<Edition>, DbErr>;
    async fn find_edition_by_date(&self, date: NaiveDate) -> Result<Option<Edition>, DbErr>;
    async fn create_edition(&self, new: NewEdition) -> Result<Edition, DbErr>;
    async fn set_editor_note(&self, edition_id: Uuid, note: &str) -> Result<(), DbErr>;
    async fn set_worth_watching(
        &self,
        edition_id: Uuid,
        sections: serde_json::Value,
    ) -> Result<(), DbErr>;
    async fn set_subjects(
        &self,
        edition_id: Uuid,
        subject_a: &str,
        subject_b: &str,
    ) -> Result<(), DbErr>;
    async fn begin_edition_send(&self, edition_id: Uuid) -> Result<bool, DbErr>;
    async fn complete_edition_send(
        &self,
        edition_id: Uuid,
        sent_count: i32,
        failed_count: i32,
    ) -> Result<(), DbErr>;

    // Stories
    async fn stories_with_articles(
        &self,
        edition_id: Uuid,
    ) -> Result<Vec<(Story, Option<Article>)>, DbErr>;
    async fn set_story_summary(&self, story_id: Uuid, summary: &str) -> Result<(), DbErr>;

    // Supplementary content rotation
    async fn next_mystery_link(&self) -> Result<Option<MysteryLink>, DbErr>;
    async fn mark_mystery_link_used(&self, id: Uuid) -> Result<(), DbErr>;
    async fn next_fun_fact(&self) -> Result<Option<FunFact>, DbErr>;
    async fn mark_fun_fact_used(&self, id: Uuid) -> Result<(), DbErr>;
    async fn active_sponsor(&self) -> Result<Option<Sponsor>, DbErr>;
    async fn find_mystery_link(&self, id: Uuid) -> Result<Option<MysteryLink>, DbErr>;
    async fn find_fun_fact(&self, id: Uuid) -> Result<Option<FunFact>, DbErr>;
    async fn find_sponsor(&self, id: Uuid) -> Result<Option<Sponsor>, DbErr>;

    // Subscribers and sends
    async fn confirmed_subscribers(&self) -> Result<Vec<Subscriber>, DbErr>;
    async fn create_send(
        &self,
        edition_id: Uuid,
        subscriber_id: Uuid,
        variant: &str,
    ) -> Result<models::Send, DbErr>;
    async fn mark_send_sent(&self, send_id: Uuid, provider_message_id: &str) -> Result<(), DbErr>;
    async fn mark_send_failed(&self, send_id: Uuid) -> Result<(), DbErr>;
}

#[async_trait]
impl Store for Repository {
    async fn ranked_articles(&self, window_days: i64, limit: u64) -> Result<Vec<Article>, DbErr> {
        Repository::ranked_articles(self, window_days, limit).await
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>, DbErr> {
        Repository::find_article(self, id).await
    }

    async fn find_edition(&self, id: Uuid) -> Result<Option<Edition>, DbErr> {
        Repository::find_edition(self, id).await
    }

    async fn find_edition_by_date(&self, date: NaiveDate) -> Result<Option<Edition>, DbErr> {
        Repository::find_edition_by_date(self, date).await
    }

    async fn create_edition(&self, new: NewEdition) -> Result<Edition, DbErr> {
        Repository::create_edition(self, new).await
    }

    async fn set_editor_note(&self, edition_id: Uuid, note: &str) -> Result<(), DbErr> {
        Repository::set_editor_note(self, edition_id, note).await
    }

    async fn set_worth_watching(
        &self,
        edition_id: Uuid,
        sections: serde_json::Value,
    ) -> Result<(), DbErr> {
        Repository::set_worth_watching(self, edition_id, sections).await
    }

    async fn set_subjects(
        &self,
        edition_id: Uuid,
        subject_a: &str,
        subject_b: &str,
    ) -> Result<(), DbErr> {
        Repository::set_subjects(self, edition_id, subject_a, subject_b).await
    }

    async fn begin_edition_send(&self, edition_id: Uuid) -> Result<bool, DbErr> {
        Repository::begin_edition_send(self, edition_id).await
    }

    async fn complete_edition_send(
        &self,
        edition_id: Uuid,
        sent_count: i32,
        failed_count: i32,
    ) -> Result<(), DbErr> {
        Repository::complete_edition_send(self, edition_id, sent_count, failed_count).await
    }

    async fn stories_with_articles(
        &self,
        edition_id: Uuid,
    ) -> Result<Vec<(Story, Option<Article>)>, DbErr> {
        Repository::stories_with_articles(self, edition_id).await
    }

    async fn set_story_summary(&self, story_id: Uuid, summary: &str) -> Result<(), DbErr> {
        Repository::set_story_summary(self, story_id, summary).await
    }

    async fn next_mystery_link(&self) -> Result<Option<MysteryLink>, DbErr> {
        Repository::next_mystery_link(self).await
    }

    async fn mark_mystery_link_used(&self, id: Uuid) -> Result<(), DbErr> {
        Repository::mark_mystery_link_used(self, id).await
    }

    async fn next_fun_fact(&self) -> Result<Option<FunFact>, DbErr> {
        Repository::next_fun_fact(self).await
    }

    async fn mark_fun_fact_used(&self, id: Uuid) -> Result<(), DbErr> {
        Repository::mark_fun_fact_used(self, id).await
    }

    async fn active_sponsor(&self) -> Result<Option<Sponsor>, DbErr> {
        Repository::active_sponsor(self).await
    }

    async fn find_mystery_link(&self, id: Uuid) -> Result<Option<MysteryLink>, DbErr> {
        Repository::find_mystery_link(self, id).await
    }

    async fn find_fun_fact(&self, id: Uuid) -> Result<Option<FunFact>, DbErr> {
        Repository::find_fun_fact(self, id).await
    }

    async fn find_sponsor(&self, id: Uuid) -> Result<Option<Sponsor>, DbErr> {
        Repository::find_sponsor(self, id).await
    }

    async fn confirmed_subscribers(&self) -> Result<Vec<Subscriber>, DbErr> {
        Repository::confirmed_subscribers(self).await
    }

    async fn create_send(
        &self,
        edition_id: Uuid,
        subscriber_id: Uuid,
        variant: &str,
    ) -> Result<models::Send, DbErr> {
        Repository::create_send(self, edition_id, subscriber_id, variant).await
    }

    async fn mark_send_sent(&self, send_id: Uuid, provider_message_id: &str) -> Result<(), DbErr> {
        Repository::mark_send_sent(self, send_id, provider_message_id).await
    }

    async fn mark_send_failed(&self, send_id: Uuid) -> Result<(), DbErr> {
        Repository::mark_send_failed(self, send_id).await
    }
}

/// In-memory store for service tests. Holds at most one edition, which is
/// what every service operation works on.
#[cfg(test)]
pub struct MockStore {
    pub edition: std::sync::Mutex<Option<Edition>>,
    pub articles: std::sync::Mutex<Vec<Article>>,
    pub stories: std::sync::Mutex<Vec<(Story, Option<Article>)>>,
    pub subscribers: std::sync::Mutex<Vec<Subscriber>>,
    pub sends: std::sync::Mutex<Vec<models::Send>>,
    pub sent_ids: std::sync::Mutex<Vec<Uuid>>,
    pub failed_ids: std::sync::Mutex<Vec<Uuid>>,
    pub completed: std::sync::Mutex<Option<(i32, i32)>>,
}

#[cfg(test)]
impl Default for MockStore {
    fn default() -> Self {
        Self {
            edition: std::sync::Mutex::new(None),
            articles: std::sync::Mutex::new(Vec::new()),
            stories: std::sync::Mutex::new(Vec::new()),
            subscribers: std::sync::Mutex::new(Vec::new()),
            sends: std::sync::Mutex::new(Vec::new()),
            sent_ids: std::sync::Mutex::new(Vec::new()),
            failed_ids: std::sync::Mutex::new(Vec::new()),
            completed: std::sync::Mutex::new(None),
        }
    }
}

/// Build a bare draft edition for tests.
#[cfg(test)]
pub fn draft_edition(id: Uuid, date: NaiveDate, hero_article_id: Option<Uuid>) -> Edition {
    use super::models::edition_status;
    let now = chrono::Utc::now();
    Edition {
        id,
        edition_date: date,
        status: edition_status::DRAFT.to_string(),
        hero_article_id,
        editor_note: None,
        worth_watching: None,
        subject_a: None,
        subject_b: None,
        subject_winner: None,
        mystery_link_id: None,
        fun_fact_id: None,
        sponsor_id: None,
        sent_count: 0,
        failed_count: 0,
        sent_at: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

#[cfg(test)]
#[async_trait]
impl Store for MockStore {
    async fn ranked_articles(&self, _window_days: i64, _limit: u64) -> Result<Vec<Article>, DbErr> {
        Ok(self.articles.lock().unwrap().clone())
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>, DbErr> {
        Ok(self
            .articles
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_edition(&self, id: Uuid) -> Result<Option<Edition>, DbErr> {
        Ok(self
            .edition
            .lock()
            .unwrap()
            .clone()
            .filter(|e| e.id == id))
    }

    async fn find_edition_by_date(&self, date: NaiveDate) -> Result<Option<Edition>, DbErr> {
        Ok(self
            .edition
            .lock()
            .unwrap()
            .clone()
            .filter(|e| e.edition_date == date))
    }

    async fn create_edition(&self, new: NewEdition) -> Result<Edition, DbErr> {
        let edition = draft_edition(Uuid::new_v4(), new.edition_date, Some(new.hero_article_id));

        let mut stories = self.stories.lock().unwrap();
        for (idx, article_id) in new.story_article_ids.iter().enumerate() {
            let article = self
                .articles
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == *article_id)
                .cloned();
            stories.push((
                Story {
                    id: Uuid::new_v4(),
                    edition_id: edition.id,
                    article_id: *article_id,
                    position: (idx + 1) as i32,
                    summary: None,
                    created_at: chrono::Utc::now().into(),
                },
                article,
            ));
        }

        *self.edition.lock().unwrap() = Some(edition.clone());
        Ok(edition)
    }

    async fn set_editor_note(&self, edition_id: Uuid, note: &str) -> Result<(), DbErr> {
        if let Some(e) = self.edition.lock().unwrap().as_mut() {
            if e.id == edition_id {
                e.editor_note = Some(note.to_string());
            }
        }
        Ok(())
    }

    async fn set_worth_watching(
        &self,
        edition_id: Uuid,
        sections: serde_json::Value,
    ) -> Result<(), DbErr> {
        if let Some(e) = self.edition.lock().unwrap().as_mut() {
            if e.id == edition_id {
                e.worth_watching = Some(sections);
            }
        }
        Ok(())
    }

    async fn set_subjects(
        &self,
        edition_id: Uuid,
        subject_a: &str,
        subject_b: &str,
    ) -> Result<(), DbErr> {
        if let Some(e) = self.edition.lock().unwrap().as_mut() {
            if e.id == edition_id {
                e.subject_a = Some(subject_a.to_string());
                e.subject_b = Some(subject_b.to_string());
            }
        }
        Ok(())
    }

    async fn begin_edition_send(&self, edition_id: Uuid) -> Result<bool, DbErr> {
        use super::models::edition_status;
        let mut guard = self.edition.lock().unwrap();
        match guard.as_mut() {
            Some(e) if e.id == edition_id && e.status == edition_status::DRAFT => {
                e.status = edition_status::SENDING.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_edition_send(
        &self,
        edition_id: Uuid,
        sent_count: i32,
        failed_count: i32,
    ) -> Result<(), DbErr> {
        use super::models::edition_status;
        if let Some(e) = self.edition.lock().unwrap().as_mut() {
            if e.id == edition_id {
                e.status = edition_status::SENT.to_string();
                e.sent_count = sent_count;
                e.failed_count = failed_count;
            }
        }
        *self.completed.lock().unwrap() = Some((sent_count, failed_count));
        Ok(())
    }

    async fn stories_with_articles(
        &self,
        edition_id: Uuid,
    ) -> Result<Vec<(Story, Option<Article>)>, DbErr> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s.edition_id == edition_id)
            .cloned()
            .collect())
    }

    async fn set_story_summary(&self, story_id: Uuid, summary: &str) -> Result<(), DbErr> {
        for (story, _) in self.stories.lock().unwrap().iter_mut() {
            if story.id == story_id {
                story.summary = Some(summary.to_string());
            }
        }
        Ok(())
    }

    async fn next_mystery_link(&self) -> Result<Option<MysteryLink>, DbErr> {
        Ok(None)
    }

    async fn mark_mystery_link_used(&self, _id: Uuid) -> Result<(), DbErr> {
        Ok(())
    }

    async fn next_fun_fact(&self) -> Result<Option<FunFact>, DbErr> {
        Ok(None)
    }

    async fn mark_fun_fact_used(&self, _id: Uuid) -> Result<(), DbErr> {
        Ok(())
    }

    async fn active_sponsor(&self) -> Result<Option<Sponsor>, DbErr> {
        Ok(None)
    }

    async fn find_mystery_link(&self, _id: Uuid) -> Result<Option<MysteryLink>, DbErr> {
        Ok(None)
    }

    async fn find_fun_fact(&self, _id: Uuid) -> Result<Option<FunFact>, DbErr> {
        Ok(None)
    }

    async fn find_sponsor(&self, _id: Uuid) -> Result<Option<Sponsor>, DbErr> {
        Ok(None)
    }

    async fn confirmed_subscribers(&self) -> Result<Vec<Subscriber>, DbErr> {
        Ok(self.subscribers.lock().unwrap().clone())
    }

    async fn create_send(
        &self,
        edition_id: Uuid,
        subscriber_id: Uuid,
        variant: &str,
    ) -> Result<models::Send, DbErr> {
        use super::models::send_status;
        let send = models::Send {
            id: Uuid::new_v4(),
            edition_id,
            subscriber_id,
            variant: variant.to_string(),
            status: send_status::PENDING.to_string(),
            provider_message_id: None,
            opened_at: None,
            open_count: 0,
            click_count: 0,
            last_clicked_at: None,
            created_at: chrono::Utc::now().into(),
        };
        self.sends.lock().unwrap().push(send.clone());
        Ok(send)
    }

    async fn mark_send_sent(&self, send_id: Uuid, _provider_message_id: &str) -> Result<(), DbErr> {
        self.sent_ids.lock().unwrap().push(send_id);
        Ok(())
    }

    async fn mark_send_failed(&self, send_id: Uuid) -> Result<(), DbErr> {
        self.failed_ids.lock().unwrap().push(send_id);
        Ok(())
    }
}
