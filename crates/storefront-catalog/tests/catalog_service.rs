mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use serde_json::json;
use storefront_catalog::{CatalogConfig, CatalogError, Listing};
use storefront_core::{ProductId, UserId};
use storefront_storage::{AssetStore, DocumentStore};

// ==================== Listings ====================

#[tokio::test]
async fn listing_is_newest_first_and_shared_between_readers() {
    let h = Harness::new();
    h.seed(&[
        product(1, "Old", 100),
        product(2, "New", 300),
        product(3, "Mid", 200),
    ]);

    let mut a = h.service.list_products();
    let mut b = h.service.list_products();

    assert_eq!(names(&next(&mut a).await), vec!["New", "Mid", "Old"]);
    assert_eq!(names(&next(&mut b).await), vec!["New", "Mid", "Old"]);
    assert_eq!(h.store.watch_calls(), 1);
    assert_eq!(h.service.cache().subscriber_count(), 2);
}

#[tokio::test]
async fn listing_failure_degrades_to_empty_list() {
    let h = Harness::new();
    h.store.fail_watch.store(true, Ordering::SeqCst);

    let mut products = h.service.list_products();
    assert!(next(&mut products).await.is_empty());
    ends(&mut products).await;

    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: getProducts failed: Connection error: store offline"]
    );
}

#[tokio::test]
async fn listing_follows_writes() {
    let h = Harness::new();
    let mut all = h.service.list_products();
    assert!(next(&mut all).await.is_empty());

    let outcome = h.service.add_product(product(5, "Desk", 50), &[]).await;
    assert!(outcome.is_applied());
    assert_eq!(names(&next(&mut all).await), vec!["Desk"]);
}

#[tokio::test]
async fn limited_listing_keeps_every_product_available_for_lookup() {
    let h = Harness::new();
    h.seed(&[product(1, "Old", 100), product(2, "New", 300)]);

    let mut newest = h.service.list_products_with(Listing::newest(1));
    assert_eq!(names(&next(&mut newest).await), vec!["New"]);

    let mut old = h.service.get_product(1);
    assert_eq!(next(&mut old).await.map(|p| p.name), Some("Old".to_string()));
    assert!(h.error_texts().is_empty());
    assert_eq!(h.store.watch_calls(), 1);

    let mut all = h.service.list_products();
    assert_eq!(names(&next(&mut all).await), vec!["New", "Old"]);
}

#[tokio::test]
async fn limit_applies_to_each_snapshot() {
    let h = Harness::new();
    h.seed(&[product(1, "Old", 100)]);

    let mut newest = h.service.list_products_with(Listing::newest(1));
    assert_eq!(names(&next(&mut newest).await), vec!["Old"]);

    assert!(h.service.add_product(product(2, "New", 300), &[]).await.is_applied());
    assert_eq!(names(&next(&mut newest).await), vec!["New"]);
}

#[tokio::test]
async fn supplementary_listings_query_the_store_directly() {
    let h = Harness::new();
    let mut on_sale = product(1, "Lamp", 100);
    on_sale.extra.insert("sale".into(), json!(true));
    on_sale.current_rating = 2.0;
    let mut also_on_sale = product(2, "Desk", 300);
    also_on_sale.extra.insert("sale".into(), json!(true));
    also_on_sale.current_rating = 4.5;
    let mut regular = product(3, "Chair", 200);
    regular.current_rating = 3.0;
    h.seed(&[on_sale, also_on_sale, regular]);

    let mut sale = h.service.query_products("sale", true, 1);
    assert_eq!(names(&next(&mut sale).await), vec!["Lamp"]);

    let mut newest = h.service.products_by_date(2);
    assert_eq!(names(&next(&mut newest).await), vec!["Desk", "Chair"]);

    let mut best = h.service.products_by_rating(2);
    assert_eq!(names(&next(&mut best).await), vec!["Desk", "Chair"]);

    assert_eq!(h.store.watch_calls(), 3);
    assert!(!h.service.cache().is_cached());
}

// ==================== Lookups ====================

#[tokio::test]
async fn get_product_projects_the_cached_collection() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1), product(2, "Desk", 2)]);

    let mut all = h.service.list_products();
    next(&mut all).await;

    let mut lamp = h.service.get_product(1);
    assert_eq!(next(&mut lamp).await.map(|p| p.name), Some("Lamp".to_string()));
    assert_eq!(h.store.watch_calls(), 1);
}

#[tokio::test]
async fn get_product_reports_missing_products() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1)]);

    let mut ghost = h.service.get_product(9);
    assert_eq!(next(&mut ghost).await, None);
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: Found no Product with id=9"]
    );
}

#[tokio::test]
async fn get_product_distinguishes_text_and_numeric_ids() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1)]);

    let mut by_number = h.service.get_product(1);
    let mut by_text = h.service.get_product("1");
    assert!(next(&mut by_number).await.is_some());
    assert!(next(&mut by_text).await.is_none());
}

#[tokio::test]
async fn get_product_sees_deletions() {
    let h = Harness::new();
    let lamp = product(1, "Lamp", 1);
    h.seed(&[lamp.clone()]);

    let mut stream = h.service.get_product(1);
    assert!(next(&mut stream).await.is_some());

    assert!(h.service.delete_product(lamp).await.is_applied());
    assert_eq!(next(&mut stream).await, None);
}

// ==================== Ratings ====================

#[tokio::test]
async fn rating_replaces_user_score_and_recomputes_average() {
    let h = Harness::new();
    let mut chair = product(1, "Chair", 1);
    chair.ratings = BTreeMap::from([("u1".to_string(), 4.0), ("u2".to_string(), 2.0)]);
    chair.current_rating = 3.0;
    h.seed(&[chair.clone()]);

    let u3 = UserId::new("u3").unwrap();
    let outcome = h.service.rate_product(chair, 3.0, &u3).await;
    assert!(outcome.is_applied());
    assert_eq!(outcome.product().current_rating, 3.0);

    let (key, patch) = h.store.last_patch().unwrap();
    assert_eq!(key, "1");
    assert_eq!(patch.paths(), vec!["ratings/u3", "currentRating"]);

    let stored = h.stored(1).await.unwrap();
    assert_eq!(stored.ratings.len(), 3);
    assert_eq!(stored.current_rating, 3.0);
    assert_eq!(stored.name, "Chair");

    let u1 = UserId::new("u1").unwrap();
    let outcome = h.service.rate_product(outcome.into_product(), 5.0, &u1).await;
    assert!((outcome.product().current_rating - 10.0 / 3.0).abs() < 1e-9);

    let stored = h.stored(1).await.unwrap();
    assert_eq!(stored.ratings["u1"], 5.0);
    assert_eq!(stored.ratings.len(), 3);
    assert_eq!(
        h.message_texts().last().map(String::as_str),
        Some("CatalogService: Rated Product Chair with: 5.0")
    );
}

#[tokio::test]
async fn out_of_range_rating_is_not_written() {
    let h = Harness::new();
    let chair = product(1, "Chair", 1);
    h.seed(&[chair.clone()]);

    let u1 = UserId::new("u1").unwrap();
    let outcome = h.service.rate_product(chair.clone(), 7.0, &u1).await;

    assert!(matches!(
        outcome.error(),
        Some(CatalogError::InvalidRating { value, .. }) if *value == 7.0
    ));
    assert_eq!(outcome.product(), &chair);
    assert!(h.journal.entries().is_empty());
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: rateProduct failed: Rating 7 is outside the allowed range 1..=5"]
    );
}

#[tokio::test]
async fn rating_a_missing_product_is_rejected() {
    let h = Harness::new();
    let u1 = UserId::new("u1").unwrap();
    let outcome = h.service.rate_product(product(4, "Ghost", 1), 3.0, &u1).await;
    assert!(matches!(outcome.error(), Some(CatalogError::NotFound { id }) if *id == ProductId::from(4)));
}

// ==================== Adding ====================

#[tokio::test]
async fn add_uploads_every_file_before_writing() {
    let h = Harness::new();
    let outcome = h
        .service
        .add_product(product(5, "Desk", 50), &[png("a.png"), png("b.png")])
        .await;

    assert!(outcome.is_applied());
    assert_eq!(
        h.journal.entries(),
        vec!["upload a.png", "upload b.png", "set products/5"]
    );

    let stored = h.stored(5).await.unwrap();
    assert_eq!(stored.image_urls.len(), 2);
    assert!(stored.image_refs[0].ends_with("-a.png"));
    assert!(stored.image_refs[1].ends_with("-b.png"));
    for (url, storage_ref) in stored.image_urls.iter().zip(&stored.image_refs) {
        assert!(url.ends_with(storage_ref.as_str()));
        assert!(h.assets.memory.contains(storage_ref));
    }
    assert_eq!(
        h.message_texts(),
        vec!["CatalogService: Added Product Desk"]
    );
}

#[tokio::test]
async fn failed_upload_leaves_no_record() {
    let h = Harness::new();
    *h.assets.fail_upload_of.lock() = Some("b.png".into());

    let input = product(5, "Desk", 50);
    let outcome = h
        .service
        .add_product(input.clone(), &[png("a.png"), png("b.png")])
        .await;

    assert!(matches!(
        outcome.error(),
        Some(CatalogError::UploadFailure { file, .. }) if file == "b.png"
    ));
    assert_eq!(outcome.product(), &input);
    assert!(h.stored(5).await.is_none());
    assert!(h.assets.memory.is_empty());
    assert_eq!(
        h.journal.entries(),
        vec!["upload a.png", "upload b.png", "delete 1"]
    );
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: Add Failed, Product Desk"]
    );
}

#[tokio::test]
async fn failed_create_discards_uploads() {
    let h = Harness::new();
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let outcome = h
        .service
        .add_product(product(5, "Desk", 50), &[png("a.png")])
        .await;

    assert!(matches!(
        outcome.error(),
        Some(CatalogError::RemoteFailure { operation, .. }) if operation == "addProduct"
    ));
    assert!(h.assets.memory.is_empty());
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: Add Failed, Product Desk"]
    );
}

// ==================== Updating ====================

#[tokio::test]
async fn update_replaces_primary_image_then_deletes_old_asset() {
    let h = Harness::new();
    let old = h
        .assets
        .memory
        .upload(&ProductId::from(1), &png("old.png"))
        .await
        .unwrap();
    let mut lamp = product(1, "Lamp", 1);
    lamp.push_image(&old.download_url, &old.storage_ref);
    h.seed(&[lamp.clone()]);

    let mut edited = lamp.clone();
    edited.price = 12.5;
    let outcome = h
        .service
        .update_product(edited, &[png("new.png"), png("extra.png")])
        .await;

    assert!(outcome.is_applied());
    assert!(outcome.warnings().is_empty());
    assert_eq!(
        h.journal.entries(),
        vec!["upload new.png", "upload extra.png", "patch products/1", "delete 1"]
    );

    let stored = h.stored(1).await.unwrap();
    assert_eq!(stored.price, 12.5);
    assert_eq!(stored.image_refs.len(), 2);
    assert!(stored.image_refs[0].ends_with("-new.png"));
    assert!(stored.image_refs[1].ends_with("-extra.png"));
    assert!(stored.check_image_pairs().is_ok());
    assert!(!h.assets.memory.contains(&old.storage_ref));
}

#[tokio::test]
async fn update_without_files_patches_fields() {
    let h = Harness::new();
    let mut lamp = product(1, "Lamp", 1);
    lamp.extra.insert("sale".into(), json!(true));
    h.seed(&[lamp.clone()]);

    let mut edited = lamp.clone();
    edited.name = "Desk lamp".into();
    let outcome = h.service.update_product(edited, &[]).await;

    assert!(outcome.is_applied());
    assert_eq!(h.journal.entries(), vec!["patch products/1"]);
    let stored = h.stored(1).await.unwrap();
    assert_eq!(stored.name, "Desk lamp");
    assert_eq!(stored.extra.get("sale"), Some(&json!(true)));
    assert_eq!(
        h.message_texts(),
        vec!["CatalogService: Updated Product Desk lamp"]
    );
}

#[tokio::test]
async fn update_of_featured_product_keeps_featured_image_out_of_record() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1)]);
    h.store.memory.seed("featured", [("1", json!({"imageFeaturedUrl": "f1"}))]);

    let mut featured = h.service.list_featured();
    let mut lamp = next(&mut featured).await.remove(0);
    assert_eq!(lamp.image_featured_url.as_deref(), Some("f1"));
    lamp.price = 12.0;

    assert!(h.service.update_product(lamp, &[]).await.is_applied());

    let (_, patch) = h.store.last_patch().unwrap();
    assert!(patch.get("imageFeaturedUrl").is_none());
    let raw = h.store.memory.get("products", "1").await.unwrap().unwrap();
    assert!(raw.get("imageFeaturedUrl").is_none());
    assert_eq!(raw["price"], json!(12.0));
}

#[tokio::test]
async fn add_never_stores_a_featured_image() {
    let h = Harness::new();
    let mut desk = product(5, "Desk", 50);
    desk.image_featured_url = Some("f5".into());

    assert!(h.service.add_product(desk, &[]).await.is_applied());

    let raw = h.store.memory.get("products", "5").await.unwrap().unwrap();
    assert!(raw.get("imageFeaturedUrl").is_none());
    assert_eq!(raw["name"], json!("Desk"));
}

#[tokio::test]
async fn update_of_missing_product_is_rejected() {
    let h = Harness::new();
    let outcome = h.service.update_product(product(42, "Ghost", 1), &[]).await;

    assert!(matches!(outcome.error(), Some(CatalogError::NotFound { .. })));
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: updateProduct failed: Found no Product with id=42"]
    );
}

#[tokio::test]
async fn failed_old_asset_delete_is_a_warning() {
    let h = Harness::new();
    let mut lamp = product(1, "Lamp", 1);
    lamp.push_image("https://cdn.test/gone", "products/1/gone");
    h.seed(&[lamp.clone()]);

    let outcome = h.service.update_product(lamp, &[png("new.png")]).await;

    assert!(outcome.is_applied());
    assert!(matches!(
        outcome.warnings(),
        [CatalogError::PartialDeleteFailure { refs, .. }] if refs == &vec!["products/1/gone".to_string()]
    ));
    assert!(h.stored(1).await.unwrap().image_refs[0].ends_with("-new.png"));
}

// ==================== Deleting ====================

#[tokio::test]
async fn delete_removes_assets_then_record() {
    let h = Harness::new();
    let asset = h
        .assets
        .memory
        .upload(&ProductId::from(1), &png("a.png"))
        .await
        .unwrap();
    let mut lamp = product(1, "Lamp", 1);
    lamp.push_image(&asset.download_url, &asset.storage_ref);
    h.seed(&[lamp.clone()]);

    let outcome = h.service.delete_product(lamp).await;

    assert!(outcome.is_applied());
    assert_eq!(h.journal.entries(), vec!["delete 1", "remove products/1"]);
    assert!(h.stored(1).await.is_none());
    assert!(h.assets.memory.is_empty());
    assert_eq!(
        h.message_texts(),
        vec!["CatalogService: success deleting Lamp"]
    );
}

#[tokio::test]
async fn asset_delete_failure_does_not_block_record_delete() {
    let h = Harness::new();
    let mut lamp = product(1, "Lamp", 1);
    lamp.push_image("https://cdn.test/x", "products/1/x");
    h.seed(&[lamp.clone()]);
    h.assets.fail_delete.store(true, Ordering::SeqCst);

    let outcome = h.service.delete_product(lamp).await;

    assert!(outcome.is_applied());
    assert_eq!(outcome.warnings().len(), 1);
    assert!(h.stored(1).await.is_none());
    assert_eq!(
        h.error_texts(),
        vec!["CatalogService: Could not delete images of Lamp: Asset error: permission denied"]
    );
}

#[tokio::test]
async fn delete_failure_is_reported() {
    let h = Harness::new();
    let lamp = product(1, "Lamp", 1);
    h.seed(&[lamp.clone()]);
    h.store.memory.set_read_only(true);

    let outcome = h.service.delete_product(lamp).await;

    assert!(matches!(
        outcome.error(),
        Some(CatalogError::RemoteFailure { message, .. })
            if message == "Permission denied: products is read-only"
    ));
    assert!(h.stored(1).await.is_some());
    assert_eq!(h.error_texts(), vec!["CatalogService: Delete failed Lamp"]);
}

// ==================== Featured ====================

#[tokio::test]
async fn featured_products_carry_their_featured_image() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1), product(2, "Desk", 2)]);
    h.store.memory.seed(
        "featured",
        [
            ("1", json!({"imageFeaturedUrl": "https://cdn.test/f1.png"})),
            ("2", json!({"imageFeaturedUrl": "https://cdn.test/f2.png"})),
        ],
    );

    let mut featured = h.service.list_featured();
    let list = next(&mut featured).await;

    assert_eq!(names(&list), vec!["Lamp", "Desk"]);
    assert_eq!(
        list[1].image_featured_url.as_deref(),
        Some("https://cdn.test/f2.png")
    );
}

#[tokio::test]
async fn featured_products_follow_product_and_index_changes() {
    let h = Harness::new();
    let desk = product(2, "Desk", 2);
    h.seed(&[product(1, "Lamp", 1), desk.clone()]);
    h.store.memory.seed(
        "featured",
        [("1", json!({"imageFeaturedUrl": "f1"})), ("2", json!({"imageFeaturedUrl": "f2"}))],
    );

    let mut featured = h.service.list_featured();
    next(&mut featured).await;

    let mut renamed = desk;
    renamed.name = "Standing desk".into();
    assert!(h.service.update_product(renamed, &[]).await.is_applied());
    let mut list = next(&mut featured).await;
    while names(&list) != vec!["Lamp", "Standing desk"] {
        list = next(&mut featured).await;
    }
    assert_eq!(list[1].image_featured_url.as_deref(), Some("f2"));

    h.store.memory.remove("featured", "1").await.unwrap();
    let mut list = next(&mut featured).await;
    while list.len() != 1 {
        list = next(&mut featured).await;
    }
    assert_eq!(names(&list), vec!["Standing desk"]);
}

#[tokio::test]
async fn empty_featured_index_yields_empty_list() {
    let h = Harness::new();
    let mut featured = h.service.list_featured();
    assert!(next(&mut featured).await.is_empty());
}

#[tokio::test]
async fn dropping_featured_listing_releases_store_subscriptions() {
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1)]);
    h.store.memory.seed("featured", [("1", json!({"imageFeaturedUrl": "f1"}))]);

    let mut featured = h.service.list_featured();
    next(&mut featured).await;
    assert!(h.store.memory.watcher_count() >= 2);

    drop(featured);
    tokio::time::timeout(Duration::from_secs(1), async {
        while h.store.memory.watcher_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("store subscriptions should be released");
    assert!(!h.service.cache().is_cached());
}

// ==================== Cache control ====================

#[tokio::test]
async fn invalidate_forces_a_fresh_query() {
    let h = Harness::new();
    let mut first = h.service.list_products();
    next(&mut first).await;
    assert_eq!(h.store.watch_calls(), 1);

    h.service.invalidate_cache();
    let mut second = h.service.list_products();
    next(&mut second).await;
    assert_eq!(h.store.watch_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_first_readers_share_one_query() {
    const READERS: usize = 16;
    let h = Harness::new();
    h.seed(&[product(1, "Lamp", 1)]);
    let barrier = Arc::new(tokio::sync::Barrier::new(READERS));

    let tasks: Vec<_> = (0..READERS)
        .map(|_| {
            let service = h.service.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                let mut products = service.list_products();
                let len = next(&mut products).await.len();
                (products, len)
            })
        })
        .collect();

    let mut readers = Vec::with_capacity(READERS);
    for task in tasks {
        let (products, len) = task.await.unwrap();
        assert_eq!(len, 1);
        readers.push(products);
    }

    assert_eq!(h.store.watch_calls(), 1);
    assert_eq!(h.service.cache().subscriber_count(), READERS);
}

#[tokio::test]
async fn released_listing_is_queried_again() {
    let h = Harness::new();
    let first = h.service.list_products();
    drop(first);
    assert!(!h.service.cache().is_cached());

    let _second = h.service.list_products();
    assert_eq!(h.store.watch_calls(), 2);
}

#[tokio::test]
async fn writes_can_invalidate_the_cache() {
    let mut config = CatalogConfig::default();
    config.cache.invalidate_on_write = true;
    let h = Harness::with_config(config);

    let mut all = h.service.list_products();
    next(&mut all).await;
    assert!(h.service.cache().is_cached());

    assert!(h.service.add_product(product(1, "Lamp", 1), &[]).await.is_applied());
    assert!(!h.service.cache().is_cached());

    let _fresh = h.service.list_products();
    assert_eq!(h.store.watch_calls(), 2);
}

#[tokio::test]
async fn store_writes_are_visible_through_the_trait() {
    let h = Harness::new();
    h.service.add_product(product(3, "Chair", 3), &[]).await;
    let stored = h.store.get("products", "3").await.unwrap();
    assert_eq!(stored.unwrap()["name"], json!("Chair"));
}
