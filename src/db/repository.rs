//! Repository pattern for database operations
//!
//! All data access goes through here. Entity queries use SeaORM; counter
//! bumps and conditional status transitions use raw statements so they
//! stay single round-trips.

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, Statement,
};
use uuid::Uuid;

use super::models::{
    edition_status, send_status, Article, ArticleEntity, Edition, EditionActiveModel,
    EditionColumn, EditionEntity, FunFact, FunFactEntity, MysteryLink, MysteryLinkColumn,
    MysteryLinkEntity, Send, SendActiveModel, Sponsor, SponsorColumn, SponsorEntity,
    Story, StoryActiveModel, StoryColumn, StoryEntity, Subscriber, SubscriberActiveModel,
    SubscriberColumn, SubscriberEntity,
};
use crate::config::DatabaseConfig;

/// Everything the assembler needs to persist a new edition in one call.
#[derive(Debug, Clone)]
pub struct NewEdition {
    pub edition_date: NaiveDate,
    pub hero_article_id: Uuid,
    /// Ordered; stored at positions 1..=len
    pub story_article_ids: Vec<Uuid>,
    pub mystery_link_id: Option<Uuid>,
    pub fun_fact_id: Option<Uuid>,
    pub sponsor_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DbErr> {
        let mut opt = sea_orm::ConnectOptions::new(&config.url);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let db = sea_orm::Database::connect(opt).await?;
        Ok(Self { db })
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<(), DbErr> {
        self.db
            .execute(Statement::from_string(DbBackend::Postgres, "SELECT 1"))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Articles
    // ========================================================================

    /// Articles published within the trailing window, ranked by engagement
    /// (views + likes). The first entry is the hero candidate.
    pub async fn ranked_articles(
        &self,
        window_days: i64,
        limit: u64,
    ) -> Result<Vec<Article>, DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT id, title, slug, excerpt, category, image_url,
                   view_count, like_count, published_at, created_at
            FROM articles
            WHERE published_at IS NOT NULL
              AND published_at >= now() - ($1 || ' days')::interval
            ORDER BY view_count + like_count DESC, published_at DESC
            LIMIT $2
            "#,
            vec![window_days.to_string().into(), (limit as i64).into()],
        );

        ArticleEntity::find().from_raw_sql(stmt).all(&self.db).await
    }

    pub async fn find_article(&self, id: Uuid) -> Result<Option<Article>, DbErr> {
        ArticleEntity::find_by_id(id).one(&self.db).await
    }

    // ========================================================================
    // Editions
    // ========================================================================

    pub async fn find_edition(&self, id: Uuid) -> Result<Option<Edition>, DbErr> {
        EditionEntity::find_by_id(id).one(&self.db).await
    }

    pub async fn find_edition_by_date(&self, date: NaiveDate) -> Result<Option<Edition>, DbErr> {
        EditionEntity::find()
            .filter(EditionColumn::EditionDate.eq(date))
            .one(&self.db)
            .await
    }

    /// Insert an edition and its story rows. The unique index on
    /// `edition_date` backstops the existence check in the assembler.
    pub async fn create_edition(&self, new: NewEdition) -> Result<Edition, DbErr> {
        let edition_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let edition = EditionActiveModel {
            id: Set(edition_id),
            edition_date: Set(new.edition_date),
            status: Set(edition_status::DRAFT.to_string()),
            hero_article_id: Set(Some(new.hero_article_id)),
            editor_note: Set(None),
            worth_watching: Set(None),
            subject_a: Set(None),
            subject_b: Set(None),
            subject_winner: Set(None),
            mystery_link_id: Set(new.mystery_link_id),
            fun_fact_id: Set(new.fun_fact_id),
            sponsor_id: Set(new.sponsor_id),
            sent_count: Set(0),
            failed_count: Set(0),
            sent_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let edition = edition.insert(&self.db).await?;

        for (idx, article_id) in new.story_article_ids.iter().enumerate() {
            let story = StoryActiveModel {
                id: Set(Uuid::new_v4()),
                edition_id: Set(edition_id),
                article_id: Set(*article_id),
                position: Set((idx + 1) as i32),
                summary: Set(None),
                created_at: Set(now.into()),
            };
            story.insert(&self.db).await?;
        }

        Ok(edition)
    }

    pub async fn set_editor_note(&self, edition_id: Uuid, note: &str) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE editions SET editor_note = $1, updated_at = now() WHERE id = $2",
            vec![note.into(), edition_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn set_worth_watching(
        &self,
        edition_id: Uuid,
        sections: serde_json::Value,
    ) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE editions SET worth_watching = $1, updated_at = now() WHERE id = $2",
            vec![sections.into(), edition_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn set_subjects(
        &self,
        edition_id: Uuid,
        subject_a: &str,
        subject_b: &str,
    ) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE editions SET subject_a = $1, subject_b = $2, updated_at = now() WHERE id = $3",
            vec![subject_a.into(), subject_b.into(), edition_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    /// Compare-and-set draft -> sending. Returns false when the edition is
    /// not in draft, which means a send batch already ran or is running.
    pub async fn begin_edition_send(&self, edition_id: Uuid) -> Result<bool, DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE editions SET status = $1, updated_at = now() WHERE id = $2 AND status = $3",
            vec![
                edition_status::SENDING.into(),
                edition_id.into(),
                edition_status::DRAFT.into(),
            ],
        );
        let result = self.db.execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn complete_edition_send(
        &self,
        edition_id: Uuid,
        sent_count: i32,
        failed_count: i32,
    ) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE editions
            SET status = $1, sent_count = $2, failed_count = $3,
                sent_at = now(), updated_at = now()
            WHERE id = $4
            "#,
            vec![
                edition_status::SENT.into(),
                sent_count.into(),
                failed_count.into(),
                edition_id.into(),
            ],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Stories
    // ========================================================================

    /// Stories for an edition in position order, each with its article.
    pub async fn stories_with_articles(
        &self,
        edition_id: Uuid,
    ) -> Result<Vec<(Story, Option<Article>)>, DbErr> {
        StoryEntity::find()
            .filter(StoryColumn::EditionId.eq(edition_id))
            .order_by_asc(StoryColumn::Position)
            .find_also_related(ArticleEntity)
            .all(&self.db)
            .await
    }

    pub async fn set_story_summary(&self, story_id: Uuid, summary: &str) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE edition_stories SET summary = $1 WHERE id = $2",
            vec![summary.into(), story_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Supplementary content rotation
    // ========================================================================

    /// Oldest unused, non-expired mystery link.
    pub async fn next_mystery_link(&self) -> Result<Option<MysteryLink>, DbErr> {
        MysteryLinkEntity::find()
            .filter(MysteryLinkColumn::Used.eq(false))
            .filter(
                Condition::any()
                    .add(MysteryLinkColumn::ExpiresAt.is_null())
                    .add(MysteryLinkColumn::ExpiresAt.gt(chrono::Utc::now())),
            )
            .order_by_asc(MysteryLinkColumn::CreatedAt)
            .one(&self.db)
            .await
    }

    pub async fn mark_mystery_link_used(&self, id: Uuid) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE mystery_links SET used = true, used_at = now() WHERE id = $1",
            vec![id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    /// Least-recently-used fun fact; never-used facts come first.
    pub async fn next_fun_fact(&self) -> Result<Option<FunFact>, DbErr> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT id, body, use_count, last_used_at, created_at
            FROM fun_facts
            ORDER BY last_used_at ASC NULLS FIRST, created_at ASC
            LIMIT 1
            "#,
        );
        FunFactEntity::find().from_raw_sql(stmt).one(&self.db).await
    }

    pub async fn mark_fun_fact_used(&self, id: Uuid) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE fun_facts SET use_count = use_count + 1, last_used_at = now() WHERE id = $1",
            vec![id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn active_sponsor(&self) -> Result<Option<Sponsor>, DbErr> {
        SponsorEntity::find()
            .filter(SponsorColumn::Active.eq(true))
            .order_by_desc(SponsorColumn::CreatedAt)
            .one(&self.db)
            .await
    }

    pub async fn find_mystery_link(&self, id: Uuid) -> Result<Option<MysteryLink>, DbErr> {
        MysteryLinkEntity::find_by_id(id).one(&self.db).await
    }

    pub async fn find_fun_fact(&self, id: Uuid) -> Result<Option<FunFact>, DbErr> {
        FunFactEntity::find_by_id(id).one(&self.db).await
    }

    pub async fn find_sponsor(&self, id: Uuid) -> Result<Option<Sponsor>, DbErr> {
        SponsorEntity::find_by_id(id).one(&self.db).await
    }

    // ========================================================================
    // Subscribers
    // ========================================================================

    /// Confirmed, non-unsubscribed subscribers in signup order.
    pub async fn confirmed_subscribers(&self) -> Result<Vec<Subscriber>, DbErr> {
        SubscriberEntity::find()
            .filter(SubscriberColumn::Confirmed.eq(true))
            .filter(SubscriberColumn::Unsubscribed.eq(false))
            .order_by_asc(SubscriberColumn::CreatedAt)
            .all(&self.db)
            .await
    }

    pub async fn find_subscriber_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscriber>, DbErr> {
        SubscriberEntity::find()
            .filter(SubscriberColumn::Email.eq(email))
            .one(&self.db)
            .await
    }

    pub async fn create_subscriber(&self, email: &str) -> Result<Subscriber, DbErr> {
        let now = chrono::Utc::now();
        let subscriber = SubscriberActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            confirmed: Set(false),
            confirmation_token: Set(Uuid::new_v4().simple().to_string()),
            unsubscribe_token: Set(Uuid::new_v4().simple().to_string()),
            unsubscribed: Set(false),
            confirmed_at: Set(None),
            unsubscribed_at: Set(None),
            created_at: Set(now.into()),
        };
        subscriber.insert(&self.db).await
    }

    pub async fn confirm_subscriber(&self, token: &str) -> Result<Option<Subscriber>, DbErr> {
        let found = SubscriberEntity::find()
            .filter(SubscriberColumn::ConfirmationToken.eq(token))
            .one(&self.db)
            .await?;

        let Some(subscriber) = found else {
            return Ok(None);
        };

        if subscriber.confirmed {
            return Ok(Some(subscriber));
        }

        let mut active: SubscriberActiveModel = subscriber.into();
        active.confirmed = Set(true);
        active.confirmed_at = Set(Some(chrono::Utc::now().into()));
        Ok(Some(active.update(&self.db).await?))
    }

    pub async fn unsubscribe_subscriber(&self, token: &str) -> Result<Option<Subscriber>, DbErr> {
        let found = SubscriberEntity::find()
            .filter(SubscriberColumn::UnsubscribeToken.eq(token))
            .one(&self.db)
            .await?;

        let Some(subscriber) = found else {
            return Ok(None);
        };

        if subscriber.unsubscribed {
            return Ok(Some(subscriber));
        }

        let mut active: SubscriberActiveModel = subscriber.into();
        active.unsubscribed = Set(true);
        active.unsubscribed_at = Set(Some(chrono::Utc::now().into()));
        Ok(Some(active.update(&self.db).await?))
    }

    // ========================================================================
    // Sends
    // ========================================================================

    pub async fn create_send(
        &self,
        edition_id: Uuid,
        subscriber_id: Uuid,
        variant: &str,
    ) -> Result<Send, DbErr> {
        let send = SendActiveModel {
            id: Set(Uuid::new_v4()),
            edition_id: Set(edition_id),
            subscriber_id: Set(subscriber_id),
            variant: Set(variant.to_string()),
            status: Set(send_status::PENDING.to_string()),
            provider_message_id: Set(None),
            opened_at: Set(None),
            open_count: Set(0),
            click_count: Set(0),
            last_clicked_at: Set(None),
            created_at: Set(chrono::Utc::now().into()),
        };
        send.insert(&self.db).await
    }

    pub async fn mark_send_sent(
        &self,
        send_id: Uuid,
        provider_message_id: &str,
    ) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE sends SET status = $1, provider_message_id = $2 WHERE id = $3",
            vec![
                send_status::SENT.into(),
                provider_message_id.into(),
                send_id.into(),
            ],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn mark_send_failed(&self, send_id: Uuid) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE sends SET status = $1 WHERE id = $2",
            vec![send_status::FAILED.into(), send_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    /// First open sets `opened_at`; every open bumps the counter.
    pub async fn record_open(&self, send_id: Uuid) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE sends
            SET opened_at = COALESCE(opened_at, now()), open_count = open_count + 1
            WHERE id = $1
            "#,
            vec![send_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn record_click(&self, send_id: Uuid) -> Result<(), DbErr> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE sends SET click_count = click_count + 1, last_clicked_at = now() WHERE id = $1",
            vec![send_id.into()],
        );
        self.db.execute(stmt).await?;
        Ok(())
    }
}
