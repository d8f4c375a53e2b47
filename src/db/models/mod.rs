//! Database models for newsdesk
//!
//! SeaORM entities, one module per table. Counter bumps and conditional
//! status transitions are done via raw SQL in the repository.

pub mod article;
pub mod edition;
pub mod fun_fact;
pub mod mystery_link;
pub mod send;
pub mod sponsor;
pub mod story;
pub mod subscriber;

pub use article::Entity as ArticleEntity;
pub use article::Model as Article;

pub use edition::ActiveModel as EditionActiveModel;
pub use edition::Column as EditionColumn;
pub use edition::Entity as EditionEntity;
pub use edition::Model as Edition;

pub use story::ActiveModel as StoryActiveModel;
pub use story::Column as StoryColumn;
pub use story::Entity as StoryEntity;
pub use story::Model as Story;

pub use subscriber::ActiveModel as SubscriberActiveModel;
pub use subscriber::Column as SubscriberColumn;
pub use subscriber::Entity as SubscriberEntity;
pub use subscriber::Model as Subscriber;

pub use send::ActiveModel as SendActiveModel;
pub use send::Entity as SendEntity;
pub use send::Model as Send;

pub use fun_fact::Entity as FunFactEntity;
pub use fun_fact::Model as FunFact;

pub use mystery_link::Column as MysteryLinkColumn;
pub use mystery_link::Entity as MysteryLinkEntity;
pub use mystery_link::Model as MysteryLink;

pub use sponsor::Column as SponsorColumn;
pub use sponsor::Entity as SponsorEntity;
pub use sponsor::Model as Sponsor;

/// Edition lifecycle states
pub mod edition_status {
    pub const DRAFT: &str = "draft";
    pub const SENDING: &str = "sending";
    pub const SENT: &str = "sent";
}

/// Send record states
pub mod send_status {
    pub const PENDING: &str = "pending";
    pub const SENT: &str = "sent";
    pub const FAILED: &str = "failed";
}
