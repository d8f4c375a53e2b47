//! Bulk newsletter dispatch
//!
//! Splits confirmed subscribers into two 10% subject-test cohorts plus a
//! remainder on the winning line, creates one send record per recipient
//! for open/click attribution, and dispatches sequentially. Individual
//! delivery failures are logged and counted, never aborting the batch.

use crate::clients::email::{EmailClient, OutboundEmail};
use crate::config::AppConfig;
use crate::db::models::{Edition, Subscriber};
use crate::db::Store;
use crate::errors::AppError;
use crate::services::render::{self, RenderInput, RenderSponsor, RenderStory};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Variant labels stored on send records
pub mod variant {
    pub const A: &str = "a";
    pub const B: &str = "b";
    pub const WINNER: &str = "winner";
}

/// Share of subscribers in each subject-test cohort (1/10)
const TEST_COHORT_DIVISOR: usize = 10;

#[derive(Debug)]
pub struct Cohorts {
    pub a: Vec<Subscriber>,
    pub b: Vec<Subscriber>,
    pub remainder: Vec<Subscriber>,
}

/// Deterministically shuffle and partition subscribers. The same seed
/// always yields the same assignment, so a re-run of a partially failed
/// batch would target identical cohorts.
pub fn split_cohorts(mut subscribers: Vec<Subscriber>, seed: u64) -> Cohorts {
    let mut rng = StdRng::seed_from_u64(seed);
    subscribers.shuffle(&mut rng);

    let test_size = subscribers.len() / TEST_COHORT_DIVISOR;
    let remainder = subscribers.split_off(test_size * 2);
    let b = subscribers.split_off(test_size);
    let a = subscribers;

    Cohorts { a, b, remainder }
}

/// Pick the subject line for a variant label.
pub fn subject_for_variant<'a>(
    variant_label: &str,
    subject_a: &'a str,
    subject_b: &'a str,
    winner: &str,
) -> &'a str {
    match variant_label {
        variant::A => subject_a,
        variant::B => subject_b,
        _ => {
            if winner == variant::B {
                subject_b
            } else {
                subject_a
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendReport {
    pub edition_id: Uuid,
    pub test: bool,
    pub cohort_a: usize,
    pub cohort_b: usize,
    pub remainder: usize,
    pub sent: i32,
    pub failed: i32,
}

pub struct SenderService {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailClient>,
    config: Arc<AppConfig>,
}

impl SenderService {
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailClient>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            email,
            config,
        }
    }

    /// Send an edition to all confirmed subscribers, or to a single test
    /// address when `test_email` is given.
    pub async fn send_edition(
        &self,
        edition_id: Uuid,
        test_email: Option<String>,
    ) -> Result<SendReport, AppError> {
        let edition = self
            .store
            .find_edition(edition_id)
            .await?
            .ok_or_else(|| crate::not_found!("edition", edition_id))?;

        let input = self.load_render_input(&edition).await?;
        let html = render::render_edition(&input, &self.config.newsletter.base_url);

        let subject_a = edition
            .subject_a
            .clone()
            .unwrap_or_else(|| input.hero.title.clone());
        let subject_b = edition.subject_b.clone().unwrap_or_else(|| subject_a.clone());
        let winner = edition.subject_winner.as_deref().unwrap_or(variant::A);

        if let Some(address) = test_email {
            return self.send_test(&edition, &html, &subject_a, address).await;
        }

        // At most one production batch per edition.
        if !self.store.begin_edition_send(edition_id).await? {
            return Err(AppError::AlreadyExists(format!(
                "Send already started for edition {}",
                edition_id
            )));
        }

        let subscribers = self.store.confirmed_subscribers().await?;
        let total = subscribers.len();
        let cohorts = split_cohorts(subscribers, edition_id.as_u128() as u64);
        let (cohort_a, cohort_b, remainder) =
            (cohorts.a.len(), cohorts.b.len(), cohorts.remainder.len());

        let start = Instant::now();
        let mut sent = 0i32;
        let mut failed = 0i32;

        let recipients = cohorts
            .a
            .into_iter()
            .map(|s| (s, variant::A))
            .chain(cohorts.b.into_iter().map(|s| (s, variant::B)))
            .chain(cohorts.remainder.into_iter().map(|s| (s, variant::WINNER)));

        for (i, (subscriber, variant_label)) in recipients.enumerate() {
            let subject = subject_for_variant(variant_label, &subject_a, &subject_b, winner);

            match self
                .deliver(edition_id, &html, &subscriber, variant_label, subject)
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        edition_id = %edition_id,
                        subscriber_id = %subscriber.id,
                        error = %e,
                        "Delivery failed, continuing batch"
                    );
                    failed += 1;
                }
            }

            // Fixed pause every N sends to stay under provider rate limits.
            let done = i + 1;
            if done % self.config.newsletter.throttle_every == 0 && done < total {
                tokio::time::sleep(self.config.throttle_pause()).await;
            }
        }

        metrics::counter!("newsdesk_emails_sent_total").increment(sent as u64);
        metrics::counter!("newsdesk_emails_failed_total").increment(failed as u64);
        metrics::histogram!("newsdesk_send_batch_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        self.store
            .complete_edition_send(edition_id, sent, failed)
            .await?;

        tracing::info!(
            edition_id = %edition_id,
            total,
            sent,
            failed,
            cohort_a,
            cohort_b,
            remainder,
            batch_ms = start.elapsed().as_millis(),
            "Edition sent"
        );

        Ok(SendReport {
            edition_id,
            test: false,
            cohort_a,
            cohort_b,
            remainder,
            sent,
            failed,
        })
    }

    /// Render the edition with placeholder recipient tokens (admin preview).
    pub async fn render_preview(&self, edition_id: Uuid) -> Result<String, AppError> {
        let edition = self
            .store
            .find_edition(edition_id)
            .await?
            .ok_or_else(|| crate::not_found!("edition", edition_id))?;
        let input = self.load_render_input(&edition).await?;
        let html = render::render_edition(&input, &self.config.newsletter.base_url);
        Ok(render::personalize(&html, Uuid::nil(), "preview"))
    }

    async fn send_test(
        &self,
        edition: &Edition,
        html: &str,
        subject_a: &str,
        address: String,
    ) -> Result<SendReport, AppError> {
        if !address.contains('@') {
            return Err(AppError::ValidationError(format!(
                "'{}' is not an email address",
                address
            )));
        }

        let personalized = render::personalize(html, Uuid::nil(), "test");
        self.email
            .send(&OutboundEmail {
                to: address.clone(),
                subject: format!("[TEST] {}", subject_a),
                html: personalized,
            })
            .await?;

        tracing::info!(edition_id = %edition.id, to = %address, "Test email sent");

        Ok(SendReport {
            edition_id: edition.id,
            test: true,
            cohort_a: 0,
            cohort_b: 0,
            remainder: 0,
            sent: 1,
            failed: 0,
        })
    }

    async fn deliver(
        &self,
        edition_id: Uuid,
        html: &str,
        subscriber: &Subscriber,
        variant_label: &str,
        subject: &str,
    ) -> Result<(), AppError> {
        let send = self
            .store
            .create_send(edition_id, subscriber.id, variant_label)
            .await?;

        let personalized = render::personalize(html, send.id, &subscriber.unsubscribe_token);

        match self
            .email
            .send(&OutboundEmail {
                to: subscriber.email.clone(),
                subject: subject.to_string(),
                html: personalized,
            })
            .await
        {
            Ok(message_id) => {
                self.store.mark_send_sent(send.id, &message_id).await?;
                Ok(())
            }
            Err(e) => {
                if let Err(db_err) = self.store.mark_send_failed(send.id).await {
                    tracing::warn!(send_id = %send.id, error = %db_err, "Failed to mark send failed");
                }
                Err(e)
            }
        }
    }

    /// Resolve the edition row into pure render input.
    async fn load_render_input(&self, edition: &Edition) -> Result<RenderInput, AppError> {
        let hero_id = edition
            .hero_article_id
            .ok_or_else(|| crate::not_found!("hero article", edition.id))?;
        let hero = self
            .store
            .find_article(hero_id)
            .await?
            .ok_or_else(|| crate::not_found!("article", hero_id))?;

        let site_url = &self.config.newsletter.site_url;
        let stories = self
            .store
            .stories_with_articles(edition.id)
            .await?
            .into_iter()
            .filter_map(|(story, article)| {
                let article = article?;
                Some(RenderStory {
                    title: article.title,
                    url: article_url(site_url, &article.slug),
                    category: article.category,
                    summary: story.summary.or(article.excerpt),
                })
            })
            .collect();

        let worth_watching = edition
            .worth_watching
            .clone()
            .and_then(|v| serde_json::from_value(v).ok());

        let mystery_link = match edition.mystery_link_id {
            Some(id) => self
                .store
                .find_mystery_link(id)
                .await?
                .map(|m| (m.teaser, m.url)),
            None => None,
        };

        let fun_fact = match edition.fun_fact_id {
            Some(id) => self.store.find_fun_fact(id).await?.map(|f| f.body),
            None => None,
        };

        let sponsor = match edition.sponsor_id {
            Some(id) => self.store.find_sponsor(id).await?.map(|s| RenderSponsor {
                name: s.name,
                tagline: s.tagline,
                url: s.url,
            }),
            None => None,
        };

        Ok(RenderInput {
            newsletter_title: self.config.newsletter.title.clone(),
            edition_date: edition.edition_date,
            editor_note: edition.editor_note.clone(),
            hero: RenderStory {
                title: hero.title,
                url: article_url(site_url, &hero.slug),
                category: hero.category,
                summary: hero.excerpt,
            },
            hero_image_url: hero.image_url,
            stories,
            worth_watching,
            mystery_link,
            fun_fact,
            sponsor,
        })
    }
}

fn article_url(site_url: &str, slug: &str) -> String {
    format!("{}/articles/{}", site_url.trim_end_matches('/'), slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::email::MockEmailClient;
    use crate::db::models::{edition_status, Article};
    use crate::db::store::{draft_edition, MockStore};

    fn subscriber(n: usize) -> Subscriber {
        let now = chrono::Utc::now();
        Subscriber {
            id: Uuid::new_v4(),
            email: format!("reader{}@example.com", n),
            confirmed: true,
            confirmation_token: format!("c{}", n),
            unsubscribe_token: format!("u{}", n),
            unsubscribed: false,
            confirmed_at: Some(now.into()),
            unsubscribed_at: None,
            created_at: now.into(),
        }
    }

    fn subscribers(count: usize) -> Vec<Subscriber> {
        (0..count).map(subscriber).collect()
    }

    #[test]
    fn test_cohort_sizes_sum_to_total() {
        for total in [0, 1, 9, 10, 25, 100, 101] {
            let cohorts = split_cohorts(subscribers(total), 42);
            assert_eq!(
                cohorts.a.len() + cohorts.b.len() + cohorts.remainder.len(),
                total
            );
        }
    }

    #[test]
    fn test_cohorts_are_ten_percent() {
        let cohorts = split_cohorts(subscribers(100), 7);
        assert_eq!(cohorts.a.len(), 10);
        assert_eq!(cohorts.b.len(), 10);
        assert_eq!(cohorts.remainder.len(), 80);
    }

    #[test]
    fn test_small_lists_go_entirely_to_remainder() {
        let cohorts = split_cohorts(subscribers(9), 7);
        assert_eq!(cohorts.a.len(), 0);
        assert_eq!(cohorts.b.len(), 0);
        assert_eq!(cohorts.remainder.len(), 9);
    }

    #[test]
    fn test_cohorts_are_disjoint() {
        let cohorts = split_cohorts(subscribers(50), 3);
        let mut ids: Vec<Uuid> = cohorts
            .a
            .iter()
            .chain(&cohorts.b)
            .chain(&cohorts.remainder)
            .map(|s| s.id)
            .collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_split_is_deterministic() {
        let subs = subscribers(40);
        let first = split_cohorts(subs.clone(), 99);
        let second = split_cohorts(subs, 99);
        let ids = |c: &Cohorts| {
            (
                c.a.iter().map(|s| s.id).collect::<Vec<_>>(),
                c.b.iter().map(|s| s.id).collect::<Vec<_>>(),
            )
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_different_seeds_differ() {
        let subs = subscribers(40);
        let first = split_cohorts(subs.clone(), 1);
        let second = split_cohorts(subs, 2);
        let a_ids = |c: &Cohorts| c.a.iter().map(|s| s.id).collect::<Vec<_>>();
        assert_ne!(a_ids(&first), a_ids(&second));
    }

    /// Store pre-loaded with a draft edition, its hero article, and a
    /// confirmed subscriber list.
    fn sendable_store(subscriber_count: usize) -> (Arc<MockStore>, Uuid) {
        let edition_id = Uuid::new_v4();
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

        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut edition = draft_edition(edition_id, date, Some(hero.id));
        edition.subject_a = Some("Subject A".to_string());
        edition.subject_b = Some("Subject B".to_string());

        let store = Arc::new(MockStore::default());
        *store.edition.lock().unwrap() = Some(edition);
        store.articles.lock().unwrap().push(hero);
        *store.subscribers.lock().unwrap() = subscribers(subscriber_count);

        (store, edition_id)
    }

    fn sender(store: Arc<MockStore>, email: Arc<MockEmailClient>) -> SenderService {
        SenderService::new(store, email, Arc::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_abort_batch() {
        let (store, edition_id) = sendable_store(5);
        let email = Arc::new(MockEmailClient::new());
        email.fail_address("reader2@example.com");

        let report = sender(store.clone(), email.clone())
            .send_edition(edition_id, None)
            .await
            .unwrap();

        assert_eq!(report.sent, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(email.sent_count(), 4);
        // Every recipient got a send record; only the failure was marked failed
        assert_eq!(store.sends.lock().unwrap().len(), 5);
        assert_eq!(store.sent_ids.lock().unwrap().len(), 4);
        assert_eq!(store.failed_ids.lock().unwrap().len(), 1);
        // The batch still completed with the right accounting
        assert_eq!(*store.completed.lock().unwrap(), Some((4, 1)));
        let edition = store.edition.lock().unwrap().clone().unwrap();
        assert_eq!(edition.status, edition_status::SENT);
    }

    #[tokio::test]
    async fn test_second_send_is_conflict() {
        let (store, edition_id) = sendable_store(3);
        let email = Arc::new(MockEmailClient::new());
        let service = sender(store, email);

        service.send_edition(edition_id, None).await.unwrap();
        let err = service.send_edition(edition_id, None).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_test_mode_sends_one_email_without_state_change() {
        let (store, edition_id) = sendable_store(3);
        let email = Arc::new(MockEmailClient::new());

        let report = sender(store.clone(), email.clone())
            .send_edition(edition_id, Some("editor@example.com".to_string()))
            .await
            .unwrap();

        assert!(report.test);
        assert_eq!(report.sent, 1);
        assert_eq!(email.sent_count(), 1);
        assert!(email.sent()[0].subject.starts_with("[TEST]"));
        // No send records and the edition stays draft
        assert!(store.sends.lock().unwrap().is_empty());
        let edition = store.edition.lock().unwrap().clone().unwrap();
        assert_eq!(edition.status, edition_status::DRAFT);
    }

    #[test]
    fn test_subject_for_variant() {
        assert_eq!(subject_for_variant(variant::A, "A", "B", variant::A), "A");
        assert_eq!(subject_for_variant(variant::B, "A", "B", variant::A), "B");
        assert_eq!(
            subject_for_variant(variant::WINNER, "A", "B", variant::B),
            "B"
        );
        assert_eq!(
            subject_for_variant(variant::WINNER, "A", "B", variant::A),
            "A"
        );
    }
}
