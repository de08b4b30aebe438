//! Ordered child collections.
//!
//! Every child table has a foreign key to its root and a zero-based
//! `order_index`. Collections are never diffed: a list-valued update deletes
//! all children of the root and reinserts the caller's list, so after any
//! replace the indices are exactly `0..n-1`.
//!
//! File-backed collections (images, certificates) are the exception. Their
//! rows are deleted by id and new uploads are appended, after which
//! [`compact_order_index`] closes any gaps left by the deletions.
//!
//! Table and column names come from the `const` descriptors in this module,
//! never from user input.

use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::{PgConnection, PgExecutor, QueryBuilder};

use crate::models::common::{BlockInput, ContentBlock};

/// Describes a child table.
#[derive(Debug, Clone, Copy)]
pub struct ChildTable {
    /// Fully-qualified table name.
    pub table: &'static str,
    /// Foreign key column pointing at the root.
    pub parent_column: &'static str,
    /// Comma-separated payload columns, in the order rows bind them.
    pub columns: &'static str,
}

/// A child table whose rows each reference a file under the uploads root.
#[derive(Debug, Clone, Copy)]
pub struct FileTable {
    /// The underlying child table.
    pub rows: ChildTable,
    /// Column holding the `/uploads/...` URL.
    pub url_column: &'static str,
}

/// A value that can be inserted as one row of a child table.
///
/// Implementations push exactly one bind per entry in the table's `columns`.
pub trait ChildRow {
    /// Push this row's payload binds.
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

impl ChildRow for BlockInput {
    fn push_binds(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.title.clone());
        row.push_bind(self.content.clone());
    }
}

// =============================================================================
// SQL text
// =============================================================================

fn delete_all_sql(table: &ChildTable) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        table.table, table.parent_column
    )
}

fn insert_prefix_sql(table: &ChildTable) -> String {
    format!(
        "INSERT INTO {} ({}, {}, order_index) ",
        table.table, table.parent_column, table.columns
    )
}

fn compact_sql(table: &ChildTable) -> String {
    format!(
        "UPDATE {table} AS child \
         SET order_index = ranked.position \
         FROM ( \
             SELECT id, (ROW_NUMBER() OVER (ORDER BY order_index, id) - 1)::INTEGER AS position \
             FROM {table} WHERE {parent} = $1 \
         ) AS ranked \
         WHERE child.id = ranked.id AND child.order_index <> ranked.position",
        table = table.table,
        parent = table.parent_column,
    )
}

// =============================================================================
// Writes (always inside a unit of work)
// =============================================================================

/// Insert `items` after `start_index`, assigning consecutive order indices.
///
/// Returns the new row ids in item order.
///
/// # Errors
///
/// Returns `sqlx::Error` if the insert fails.
pub async fn insert_children<R: ChildRow>(
    conn: &mut PgConnection,
    table: &ChildTable,
    parent_id: i32,
    start_index: i32,
    items: &[R],
) -> Result<Vec<i32>, sqlx::Error> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Postgres>::new(insert_prefix_sql(table));
    let mut order_index = start_index;
    builder.push_values(items, |mut row, item| {
        row.push_bind(parent_id);
        item.push_binds(&mut row);
        row.push_bind(order_index);
        order_index += 1;
    });
    builder.push(" RETURNING id, order_index");

    // RETURNING order is unspecified; the order index maps rows back to items.
    let mut inserted: Vec<(i32, i32)> = builder.build_query_as().fetch_all(&mut *conn).await?;
    inserted.sort_by_key(|(_, order_index)| *order_index);
    Ok(inserted.into_iter().map(|(id, _)| id).collect())
}

/// Replace the whole collection of `parent_id` with `items`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the delete or insert fails.
pub async fn replace_children<R: ChildRow>(
    conn: &mut PgConnection,
    table: &ChildTable,
    parent_id: i32,
    items: &[R],
) -> Result<(), sqlx::Error> {
    let removed = sqlx::query(&delete_all_sql(table))
        .bind(parent_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    tracing::debug!(
        table = table.table,
        parent_id,
        removed,
        inserted = items.len(),
        "replacing child collection"
    );

    insert_children(conn, table, parent_id, 0, items).await?;
    Ok(())
}

/// Next free order index of a collection (0 when empty).
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn next_order_index(
    conn: &mut PgConnection,
    table: &ChildTable,
    parent_id: i32,
) -> Result<i32, sqlx::Error> {
    let max: Option<i32> = sqlx::query_scalar(&format!(
        "SELECT MAX(order_index) FROM {} WHERE {} = $1",
        table.table, table.parent_column
    ))
    .bind(parent_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max.map_or(0, |m| m + 1))
}

/// Renumber a collection to `0..n-1`, keeping the current relative order.
///
/// # Errors
///
/// Returns `sqlx::Error` if the update fails.
pub async fn compact_order_index(
    conn: &mut PgConnection,
    table: &ChildTable,
    parent_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(&compact_sql(table))
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete the listed rows of one root and return their file URLs.
///
/// Ids that belong to another root, or no longer exist, are ignored.
///
/// # Errors
///
/// Returns `sqlx::Error` if the delete fails.
pub async fn delete_file_rows(
    conn: &mut PgConnection,
    table: &FileTable,
    parent_id: i32,
    ids: &[i32],
) -> Result<Vec<String>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = sqlx::query_scalar(&format!(
        "DELETE FROM {} WHERE {} = $1 AND id = ANY($2) RETURNING {}",
        table.rows.table, table.rows.parent_column, table.url_column
    ))
    .bind(parent_id)
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    if urls.len() != ids.len() {
        tracing::debug!(
            table = table.rows.table,
            parent_id,
            requested = ids.len(),
            deleted = urls.len(),
            "some deleted ids did not match this root"
        );
    }

    Ok(urls)
}

/// Outcome of [`edit_file_collection`].
#[derive(Debug, Default)]
pub struct FileEdit {
    /// URLs of the deleted rows, to clean up after commit.
    pub removed_urls: Vec<String>,
    /// Ids of the appended rows, in item order.
    pub inserted_ids: Vec<i32>,
}

/// Delete `deleted_ids` from one root's file-backed collection, close the
/// gaps, then append `appended` after the last survivor.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails.
pub async fn edit_file_collection<R: ChildRow>(
    conn: &mut PgConnection,
    table: &FileTable,
    parent_id: i32,
    deleted_ids: &[i32],
    appended: &[R],
) -> Result<FileEdit, sqlx::Error> {
    let removed_urls = delete_file_rows(&mut *conn, table, parent_id, deleted_ids).await?;
    if !removed_urls.is_empty() {
        compact_order_index(&mut *conn, &table.rows, parent_id).await?;
    }

    let start = next_order_index(&mut *conn, &table.rows, parent_id).await?;
    let inserted_ids = insert_children(&mut *conn, &table.rows, parent_id, start, appended).await?;

    Ok(FileEdit {
        removed_urls,
        inserted_ids,
    })
}

/// Every file URL referenced by one root's collection.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn file_urls<'e>(
    executor: impl PgExecutor<'e>,
    table: &FileTable,
    parent_id: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT {} FROM {} WHERE {} = $1 ORDER BY order_index, id",
        table.url_column, table.rows.table, table.rows.parent_column
    ))
    .bind(parent_id)
    .fetch_all(executor)
    .await
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BlockRow {
    id: i32,
    title: String,
    content: String,
    order_index: i32,
}

/// Load a title/content block collection ordered by `order_index`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn fetch_blocks<'e>(
    executor: impl PgExecutor<'e>,
    table: &ChildTable,
    parent_id: i32,
) -> Result<Vec<ContentBlock>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BlockRow>(&format!(
        "SELECT id, title, content, order_index FROM {} WHERE {} = $1 ORDER BY order_index, id",
        table.table, table.parent_column
    ))
    .bind(parent_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ContentBlock {
            id: r.id.into(),
            title: r.title,
            content: r.content,
            order_index: r.order_index,
        })
        .collect())
}
