use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Service, ServicePackage},
    error::{AppError, Result},
    repository::CatalogRepository,
};

#[derive(FromRow)]
struct ServiceRow {
    id: String,
    seller_id: String,
    title: String,
    is_published: bool,
}

#[derive(FromRow)]
struct PackageRow {
    id: String,
    service_id: String,
    name: String,
    price_cents: i64,
    is_active: bool,
}

/// Read-only view over the catalog tables owned by the catalog service.
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_service(&self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, seller_id, title, is_published FROM services WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Service {
                id: Self::parse_uuid(&r.id)?,
                seller_id: Self::parse_uuid(&r.seller_id)?,
                title: r.title,
                is_published: r.is_published,
            })),
            None => Ok(None),
        }
    }

    async fn find_package(&self, service_id: Uuid, package_id: Uuid) -> Result<Option<ServicePackage>> {
        let row = sqlx::query_as::<_, PackageRow>(
            r#"
            SELECT id, service_id, name, price_cents, is_active
            FROM service_packages
            WHERE id = ? AND service_id = ?
            "#
        )
        .bind(package_id.to_string())
        .bind(service_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(ServicePackage {
                id: Self::parse_uuid(&r.id)?,
                service_id: Self::parse_uuid(&r.service_id)?,
                name: r.name,
                price_cents: r.price_cents,
                is_active: r.is_active,
            })),
            None => Ok(None),
        }
    }
}
