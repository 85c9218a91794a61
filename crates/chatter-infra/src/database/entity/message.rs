//! Message entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub author: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    #[sea_orm(indexed)]
    pub inserted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Message.
impl From<Model> for chatter_core::domain::Message {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            author: model.author,
            body: model.body,
            inserted_at: model.inserted_at.into(),
        }
    }
}

/// Conversion from Domain Message to SeaORM ActiveModel.
impl From<chatter_core::domain::Message> for ActiveModel {
    fn from(message: chatter_core::domain::Message) -> Self {
        Self {
            id: Set(message.id),
            author: Set(message.author),
            body: Set(message.body),
            inserted_at: Set(message.inserted_at.into()),
        }
    }
}
