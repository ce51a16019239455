use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mentor's bookable offering, as read from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePackage {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
}
