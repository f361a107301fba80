//! SeaORM entity models
//!
//! Database entities for Reviewflow

mod notification_outbox;
mod paper;
mod paper_version;
mod payment;
mod review;
mod sequence_counter;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use paper_version::{
    Entity as PaperVersionEntity,
    Model as PaperVersion,
    ActiveModel as PaperVersionActiveModel,
    Column as PaperVersionColumn,
};

pub use review::{
    Entity as ReviewEntity,
    Model as Review,
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
};

pub use payment::{
    Entity as PaymentEntity,
    Model as Payment,
    ActiveModel as PaymentActiveModel,
    Column as PaymentColumn,
};

pub use sequence_counter::{
    Entity as SequenceCounterEntity,
    Model as SequenceCounter,
    Column as SequenceCounterColumn,
};

pub use notification_outbox::{
    Entity as NotificationOutboxEntity,
    Model as NotificationOutbox,
    ActiveModel as NotificationOutboxActiveModel,
    Column as NotificationOutboxColumn,
};
