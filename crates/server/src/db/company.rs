//! Database operations for the company page.
//!
//! Description blocks are replaced wholesale. Certificates are file-backed:
//! they are deleted by id and new uploads are appended with the title given
//! at the same position.

use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::PgExecutor;

use showcase_core::{CertificateId, PageId};

use super::children::{
    self, ChildRow, ChildTable, FileTable, edit_file_collection, insert_children,
    replace_children,
};
use super::singleton::{ensure_absent, lock_page, settle_files};
use super::{RepositoryError, Storage};
use crate::files::{FileStore, StoredFile};
use crate::input::InputWarning;
use crate::models::common::{ContentBlock, Saved};
use crate::models::pages::{Certificate, Company, CompanyInput};

const TABLE: &str = "catalog.company";

const BLOCKS: ChildTable = ChildTable {
    table: "catalog.company_description_block",
    parent_column: "company_id",
    columns: "title, content",
};

const CERTIFICATES: FileTable = FileTable {
    rows: ChildTable {
        table: "catalog.company_certificate",
        parent_column: "company_id",
        columns: "certificate_url, title",
    },
    url_column: "certificate_url",
};

struct NewCertificate {
    url: String,
    title: String,
}

impl ChildRow for NewCertificate {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.url.clone());
        row.push_bind(self.title.clone());
    }
}

/// Pair each upload with the title at its position; missing titles are empty.
fn new_certificates(uploads: &[StoredFile], titles: &[String]) -> Vec<NewCertificate> {
    uploads
        .iter()
        .enumerate()
        .map(|(index, upload)| NewCertificate {
            url: upload.url.clone(),
            title: titles
                .get(index)
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: i32,
    title: String,
    description: String,
    version: i32,
    updated_at: DateTime<Utc>,
}

impl CompanyRow {
    fn into_company(self, blocks: Vec<ContentBlock>, certificates: Vec<Certificate>) -> Company {
        Company {
            id: PageId::new(self.id),
            title: self.title,
            description: self.description,
            version: self.version,
            blocks,
            certificates,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CertificateRow {
    id: i32,
    certificate_url: String,
    title: String,
    order_index: i32,
}

impl From<CertificateRow> for Certificate {
    fn from(row: CertificateRow) -> Self {
        Self {
            id: CertificateId::new(row.id),
            certificate_url: row.certificate_url,
            title: row.title,
            order_index: row.order_index,
        }
    }
}

/// Repository for the company page.
pub struct CompanyRepository<'a> {
    storage: &'a Storage,
    files: &'a FileStore,
}

impl<'a> CompanyRepository<'a> {
    /// Create a new company page repository.
    #[must_use]
    pub const fn new(storage: &'a Storage, files: &'a FileStore) -> Self {
        Self { storage, files }
    }

    /// Get the company page with its blocks and certificates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<Company>, RepositoryError> {
        let pool = self.storage.pool();

        let Some(root) = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, title, description, version, updated_at FROM catalog.company ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let blocks = children::fetch_blocks(pool, &BLOCKS, root.id).await?;
        let certificates = fetch_certificates(pool, root.id).await?;
        Ok(Some(root.into_company(blocks, certificates)))
    }

    /// Create the company page when none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page already exists, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(skip_all, fields(uploads = uploads.len()))]
    pub async fn create(
        &self,
        input: CompanyInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Company>, RepositoryError> {
        let certificates = new_certificates(&uploads, &input.certificate_titles);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                ensure_absent(&mut *conn, TABLE).await?;

                let id: i32 = sqlx::query_scalar(
                    "INSERT INTO catalog.company (title, description) VALUES ($1, $2) RETURNING id",
                )
                .bind(&input.title)
                .bind(&input.description)
                .fetch_one(&mut *conn)
                .await?;

                insert_children(&mut *conn, &BLOCKS, id, 0, &input.blocks).await?;
                insert_children(&mut *conn, &CERTIFICATES.rows, id, 0, &certificates).await?;

                Ok::<_, RepositoryError>(Vec::<String>::new())
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("company page created");
        self.saved(warnings).await
    }

    /// Replace the page's text and blocks, delete the listed certificates and
    /// append uploaded ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page row is missing,
    /// `RepositoryError::Conflict` on a stale `expected_version`, or
    /// `RepositoryError::Database` if a write fails.
    #[tracing::instrument(
        skip_all,
        fields(deleted = input.deleted_certificate_ids.len(), uploads = uploads.len())
    )]
    pub async fn update(
        &self,
        input: CompanyInput,
        uploads: Vec<StoredFile>,
        warnings: Vec<InputWarning>,
    ) -> Result<Saved<Company>, RepositoryError> {
        let certificates = new_certificates(&uploads, &input.certificate_titles);

        let write = self.storage.with_transaction(move |conn| {
            Box::pin(async move {
                let id = lock_page(&mut *conn, TABLE, input.expected_version).await?;

                sqlx::query(
                    r"
                    UPDATE catalog.company
                    SET title = $2, description = $3, version = version + 1
                    WHERE id = $1
                    ",
                )
                .bind(id)
                .bind(&input.title)
                .bind(&input.description)
                .execute(&mut *conn)
                .await?;

                replace_children(&mut *conn, &BLOCKS, id, &input.blocks).await?;

                let deleted: Vec<i32> = input
                    .deleted_certificate_ids
                    .iter()
                    .map(|c| c.as_i32())
                    .collect();
                let edit =
                    edit_file_collection(&mut *conn, &CERTIFICATES, id, &deleted, &certificates)
                        .await?;

                Ok::<_, RepositoryError>(edit.removed_urls)
            })
        });
        settle_files(self.files, &uploads, write).await?;

        tracing::info!("company page updated");
        self.saved(warnings).await
    }

    async fn saved(&self, warnings: Vec<InputWarning>) -> Result<Saved<Company>, RepositoryError> {
        let company = self.fetch().await?.ok_or(RepositoryError::NotFound)?;
        Ok(Saved::new(company, warnings))
    }
}

async fn fetch_certificates<'e>(
    executor: impl PgExecutor<'e>,
    company_id: i32,
) -> Result<Vec<Certificate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CertificateRow>(
        r"
        SELECT id, certificate_url, title, order_index
        FROM catalog.company_certificate
        WHERE company_id = $1
        ORDER BY order_index, id
        ",
    )
    .bind(company_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(url: &str) -> StoredFile {
        StoredFile {
            url: url.to_string(),
            original_name: "cert.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
        }
    }

    #[test]
    fn test_titles_follow_upload_position() {
        let uploads = [
            stored("/uploads/certificates/a.pdf"),
            stored("/uploads/certificates/b.pdf"),
        ];
        let titles = vec![" ISO 9001 ".to_string()];

        let certificates = new_certificates(&uploads, &titles);
        let [first, second] = certificates.as_slice() else {
            panic!("expected two certificates");
        };
        assert_eq!(first.title, "ISO 9001");
        assert_eq!(first.url, "/uploads/certificates/a.pdf");
        assert_eq!(second.title, "");
    }
}
