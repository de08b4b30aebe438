//! Product aggregate writes against a real database.
//!
//! These tests require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p showcase-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;

use showcase_core::ProductId;
use showcase_integration_tests::TestContext;
use showcase_server::db::{ProductRepository, RepositoryError};
use showcase_server::files::UploadKind;
use showcase_server::input::{FormFields, WarningKind, Warnings};
use showcase_server::models::{BlockInput, PrimaryImage, Product, ProductFilter, ProductInput};

fn input(title: &str) -> ProductInput {
    ProductInput {
        title: title.to_string(),
        description: "Silver ring".to_string(),
        price: Decimal::new(12_500, 2),
        blocks: vec![
            BlockInput {
                title: "Material".to_string(),
                content: "925 silver".to_string(),
            },
            BlockInput {
                title: "Care".to_string(),
                content: "Keep dry".to_string(),
            },
        ],
        ..ProductInput::default()
    }
}

fn primary_count(product: &Product) -> usize {
    product.images.iter().filter(|i| i.is_primary).count()
}

fn order_indexes(product: &Product) -> Vec<i32> {
    product.images.iter().map(|i| i.order_index).collect()
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_create_with_three_images_marks_first_primary(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let uploads = ctx.upload(UploadKind::Product, 3).await;
    let first_url = uploads.first().map(|u| u.url.clone()).unwrap();

    let saved = repo
        .create(input("Ring"), uploads, Vec::new())
        .await
        .expect("create failed");
    let product = saved.aggregate;

    assert_eq!(product.images.len(), 3);
    assert_eq!(primary_count(&product), 1);
    assert_eq!(product.primary_image().map(|i| i.image_url.as_str()), Some(first_url.as_str()));
    assert_eq!(order_indexes(&product), vec![0, 1, 2]);
    assert_eq!(product.blocks.len(), 2);
    assert_eq!(product.version, 1);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_deleting_primary_promotes_another_and_keeps_order_dense(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let uploads = ctx.upload(UploadKind::Product, 3).await;
    let created = repo
        .create(input("Ring"), uploads, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let old_primary = created.primary_image().cloned().unwrap();

    let mut update = input("Ring");
    update.deleted_image_ids = vec![old_primary.id];
    let new_upload = ctx.upload(UploadKind::Product, 1).await;

    let updated = repo
        .update(created.id, update, new_upload, Vec::new())
        .await
        .expect("update failed")
        .aggregate;

    assert_eq!(updated.images.len(), 3);
    assert_eq!(primary_count(&updated), 1);
    assert_ne!(updated.primary_image().map(|i| i.id), Some(old_primary.id));
    assert_eq!(order_indexes(&updated), vec![0, 1, 2]);
    assert_eq!(updated.version, 2);

    // The deleted image's file goes away once the transaction commits.
    assert!(!ctx.exists(&old_primary.image_url));
    for image in &updated.images {
        assert!(ctx.exists(&image.image_url));
    }
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_primary_can_point_at_an_upload(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let mut create = input("Ring");
    create.primary = Some(PrimaryImage::Upload(2));
    let uploads = ctx.upload(UploadKind::Product, 3).await;
    let third_url = uploads.get(2).map(|u| u.url.clone()).unwrap();

    let product = repo
        .create(create, uploads, Vec::new())
        .await
        .expect("create failed")
        .aggregate;

    assert_eq!(primary_count(&product), 1);
    assert_eq!(product.primary_image().map(|i| i.image_url.clone()), Some(third_url));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_failed_update_rolls_back_and_discards_uploads(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let ring = repo
        .create(input("Ring"), ctx.upload(UploadKind::Product, 1).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let other = repo
        .create(input("Chain"), ctx.upload(UploadKind::Product, 1).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let foreign_image = other.images.first().map(|i| i.id).unwrap();

    let mut update = input("Renamed ring");
    update.blocks = Vec::new();
    update.primary = Some(PrimaryImage::Existing(foreign_image));
    let uploads = ctx.upload(UploadKind::Product, 2).await;
    let upload_urls: Vec<String> = uploads.iter().map(|u| u.url.clone()).collect();

    let err = repo
        .update(ring.id, update, uploads, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation(_)), "got {err:?}");

    let unchanged = repo.fetch(ring.id).await.unwrap().unwrap();
    assert_eq!(unchanged.title, "Ring");
    assert_eq!(unchanged.version, ring.version);
    assert_eq!(unchanged.blocks.len(), 2);
    assert_eq!(unchanged.images, ring.images);

    for url in &upload_urls {
        assert!(!ctx.exists(url), "upload {url} was left behind");
    }
    assert_eq!(ctx.file_count(UploadKind::Product), 2);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_stale_version_is_a_conflict(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let product = repo
        .create(input("Ring"), Vec::new(), Vec::new())
        .await
        .expect("create failed")
        .aggregate;

    let mut first = input("First editor");
    first.expected_version = Some(product.version);
    repo.update(product.id, first, Vec::new(), Vec::new())
        .await
        .expect("first update failed");

    let mut second = input("Second editor");
    second.expected_version = Some(product.version);
    let err = repo
        .update(product.id, second, Vec::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)), "got {err:?}");

    let current = repo.fetch(product.id).await.unwrap().unwrap();
    assert_eq!(current.title, "First editor");
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_set_primary_moves_the_flag(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let product = repo
        .create(input("Ring"), ctx.upload(UploadKind::Product, 3).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let last = product.images.last().map(|i| i.id).unwrap();

    let updated = repo.set_primary(product.id, last).await.expect("set_primary failed");
    assert_eq!(primary_count(&updated), 1);
    assert_eq!(updated.primary_image().map(|i| i.id), Some(last));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_set_primary_rejects_foreign_image(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let ring = repo
        .create(input("Ring"), ctx.upload(UploadKind::Product, 2).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let chain = repo
        .create(input("Chain"), ctx.upload(UploadKind::Product, 1).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let foreign_image = chain.images.first().map(|i| i.id).unwrap();

    let err = repo.set_primary(ring.id, foreign_image).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound), "got {err:?}");

    let ring_after = repo.fetch(ring.id).await.unwrap().unwrap();
    assert_eq!(primary_count(&ring_after), 1);
    assert_eq!(ring_after.images, ring.images);
    let chain_after = repo.fetch(chain.id).await.unwrap().unwrap();
    assert_eq!(chain_after.images, chain.images);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_update_of_missing_product_is_not_found_and_discards_uploads(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let uploads = ctx.upload(UploadKind::Product, 2).await;
    let upload_urls: Vec<String> = uploads.iter().map(|u| u.url.clone()).collect();

    let err = repo
        .update(ProductId::new(i32::MAX), input("Ghost"), uploads, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound), "got {err:?}");

    for url in &upload_urls {
        assert!(!ctx.exists(url), "upload {url} was left behind");
    }
    assert_eq!(ctx.file_count(UploadKind::Product), 0);

    let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog.product_image")
        .fetch_one(ctx.storage.pool())
        .await
        .unwrap();
    assert_eq!(images, 0);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_delete_waits_for_writer_and_removes_its_images(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let product = repo
        .create(input("Ring"), ctx.upload(UploadKind::Product, 1).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;
    let appended = ctx.upload(UploadKind::Product, 1).await;
    let appended_url = appended.first().map(|u| u.url.clone()).unwrap();

    // A writer holds the product row and appends an image while delete runs.
    let mut writer = ctx.storage.pool().begin().await.unwrap();
    sqlx::query("SELECT id FROM catalog.product WHERE id = $1 FOR UPDATE")
        .bind(product.id)
        .execute(&mut *writer)
        .await
        .unwrap();

    let append_and_commit = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        sqlx::query(
            "INSERT INTO catalog.product_image (product_id, image_url, order_index) VALUES ($1, $2, 1)",
        )
        .bind(product.id)
        .bind(&appended_url)
        .execute(&mut *writer)
        .await
        .unwrap();
        writer.commit().await.unwrap();
    };

    let (deleted, ()) = tokio::join!(repo.delete(product.id), append_and_commit);
    deleted.expect("delete failed");

    assert!(!ctx.exists(&appended_url), "appended image file was orphaned");
    for image in &product.images {
        assert!(!ctx.exists(&image.image_url));
    }
    assert_eq!(ctx.file_count(UploadKind::Product), 0);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_delete_removes_files_and_second_delete_is_not_found(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let product = repo
        .create(input("Ring"), ctx.upload(UploadKind::Product, 2).await, Vec::new())
        .await
        .expect("create failed")
        .aggregate;

    repo.delete(product.id).await.expect("delete failed");
    for image in &product.images {
        assert!(!ctx.exists(&image.image_url));
        // Deleting an already removed file is not an error.
        assert!(!ctx.files.delete(&image.image_url).await.unwrap());
    }

    assert!(repo.fetch(product.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(product.id).await,
        Err(RepositoryError::NotFound)
    ));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_malformed_blocks_are_tolerated_with_a_warning(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    let form = FormFields::from_pairs([("title", "Ring"), ("price", "10"), ("blocks", "{not json")]);
    let mut warnings = Warnings::new();
    let parsed = ProductInput::from_form(&form, &mut warnings).unwrap();

    let saved = repo
        .create(parsed, Vec::new(), warnings.into_vec())
        .await
        .expect("create failed");

    assert!(saved.aggregate.blocks.is_empty());
    let [warning] = saved.warnings.as_slice() else {
        panic!("expected one warning, got {:?}", saved.warnings);
    };
    assert_eq!(warning.field, "blocks");
    assert_eq!(warning.kind, WarningKind::MalformedInputTolerated);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_list_folds_joined_rows_per_product(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = ProductRepository::new(&ctx.storage, &ctx.files);

    for title in ["Ring", "Chain", "Ring with stone"] {
        repo.create(input(title), ctx.upload(UploadKind::Product, 2).await, Vec::new())
            .await
            .expect("create failed");
    }

    let filter = ProductFilter {
        search: Some("ring".to_string()),
        ..ProductFilter::default()
    };
    let page = repo.list(&filter).await.expect("list failed");

    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
    for product in &page.items {
        assert_eq!(product.images.len(), 2);
        assert_eq!(product.blocks.len(), 2);
    }
    // Newest first.
    assert_eq!(
        page.items.first().map(|p| p.title.as_str()),
        Some("Ring with stone")
    );
}
