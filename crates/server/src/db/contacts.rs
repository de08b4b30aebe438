//! Database operations for the contacts page.

use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;

use showcase_core::{PageId, SocialLinkId};

use super::children::{ChildRow, ChildTable, insert_children, replace_children};
use super::singleton::{ensure_absent, lock_page};
use super::{RepositoryError, Storage};
use crate::input::InputWarning;
use crate::models::common::Saved;
use crate::models::pages::{Contacts, ContactsInput, SocialLink, SocialLinkInput};

const TABLE: &str = "catalog.contacts";

const SOCIAL_LINKS: ChildTable = ChildTable {
    table: "catalog.contacts_social_link",
    parent_column: "contacts_id",
    columns: "network, url",
};

impl ChildRow for SocialLinkInput {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.network.trim().to_string());
        row.push_bind(self.url.trim().to_string());
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContactsRow {
    id: i32,
    phone: String,
    email: String,
    address: String,
    working_hours: String,
    map_url: Option<String>,
    version: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SocialLinkRow {
    id: i32,
    network: String,
    url: String,
    order_index: i32,
}

impl From<SocialLinkRow> for SocialLink {
    fn from(row: SocialLinkRow) -> Self {
        Self {
            id: SocialLinkId::new(row.id),
            network: row.network,
            url: row.url,
            order_index: row.order_index,
        }
    }
}

/// Repository for the contacts page.
pub struct ContactsRepository<'a> {
    storage: &'a Storage,
}

impl<'a> ContactsRepository<'a> {
    /// Create a new contacts repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Get the contacts page with its social links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Contacts>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, ContactsRow>(
            r"
            SELECT id, phone, email, address, working_hours, map_url, version, updated_at
            FROM catalog.contacts
            ORDER BY id
            LIMIT 1
            ",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let social_links = sqlx::query_as::<_, SocialLinkRow>(
            r"
            SELECT id, network, url, order_index
            FROM catalog.contacts_social_link
            WHERE contacts_id = $1
            ORDER BY order_index, id
            ",
        )
        .bind(root.id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(Some(Contacts {
            id: PageId::new(root.id),
            phone: root.phone,
            email: root.email,
            address: root.address,
            working_hours: root.working_hours,
            map_url: root.map_url,
            version: root.version,
            social_links,
            updated_at: root.updated_at,
        }))
    }

    /// Create the contacts page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all)]
    pub async fn create(
        &self,
        input: ContactsInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Contacts>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    ensure_absent(&mut *conn, TABLE).await?;

                    let id: i32 = sqlx::query_scalar(
                        r"
                        INSERT INTO catalog.contacts (phone, email, address, working_hours, map_url)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING id
                        ",
                    )
                    .bind(&input.phone)
                    .bind(&input.email)
                    .bind(&input.address)
                    .bind(&input.working_hours)
                    .bind(&input.map_url)
                    .fetch_one(&mut *conn)
                    .await?;

                    insert_children(&mut *conn, &SOCIAL_LINKS, id, 0, &input.social_links).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("contacts page created");
        self.saved(warnings).await
    }

    /// Replace the contact details and the whole social link list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(links = input.social_links.len()))]
    pub async fn update(
        &self,
        input: ContactsInput,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Contacts>, RepositoryError> {
        self.storage
            .with_transaction(move |conn| {
                Box::pin(async move {
                    let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                    sqlx::query(
                        r"
                        UPDATE catalog.contacts
                        SET phone = $2, email = $3, address = $4, working_hours = $5,
                            map_url = $6, version = version + 1
                        WHERE id = $1
                        ",
                    )
                    .bind(id)
                    .bind(&input.phone)
                    .bind(&input.email)
                    .bind(&input.address)
                    .bind(&input.working_hours)
                    .bind(&input.map_url)
                    .execute(&mut *conn)
                    .await?;

                    replace_children(&mut *conn, &SOCIAL_LINKS, id, &input.social_links).await?;
                    Ok::<_, RepositoryError>(())
                })
            })
            .await?;

        tracing::info!("contacts page updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Contacts>, RepositoryError> {
        let contacts = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(contacts, warnings))
    }
}
