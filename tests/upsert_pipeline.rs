//! End-to-end checks of the lot upsert path against in-memory fakes.

mod common;

use chrono::{Duration, Utc};

use common::{category, payload, with_end, with_pictures, Harness};
use lotwatch::models::LotStatus;
use lotwatch::repository::LotRepository;
use lotwatch::services::archive::{archive_key, list_entries};
use lotwatch::services::{UpsertError, UpsertOptions};

#[tokio::test]
async fn upserting_twice_is_idempotent() {
    let h = Harness::new();
    h.marketplace
        .put_description(1, "Москва: Типография Сытина, 1887 г. Переплёт.");
    let now = Utc::now();
    let p = payload(1, 5);

    let first = h
        .handler
        .upsert_at(&p, &category(5, "Книги"), UpsertOptions::without_images(), now)
        .await
        .unwrap();
    let second = h
        .handler
        .upsert_at(&p, &category(5, "Книги"), UpsertOptions::without_images(), now + Duration::minutes(5))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.lot, second.lot);
    assert_eq!(h.repository.len().await, 1);

    let stored = h.repository.find_lot(1).await.unwrap().unwrap();
    assert_eq!(stored, second.lot);
    assert_eq!(stored.year_published, Some(1887));
    assert_eq!(stored.normalized_title, "книга 1");
}

#[tokio::test]
async fn category_name_is_first_seen() {
    let h = Harness::new();
    h.handler
        .upsert(&payload(1, 5), &category(5, "Старые книги"), UpsertOptions::without_images())
        .await
        .unwrap();
    let outcome = h
        .handler
        .upsert(&payload(2, 5), &category(5, "Renamed"), UpsertOptions::without_images())
        .await
        .unwrap();

    assert_eq!(outcome.lot.category_name, "Старые книги");
    assert_eq!(h.repository.categories().await.len(), 1);
}

#[tokio::test]
async fn ended_auction_clears_monitoring() {
    let h = Harness::new();
    let now = Utc::now();
    let end = now + Duration::hours(1);

    let open = h
        .handler
        .upsert_at(
            &with_end(payload(2, 5), end),
            &category(5, "Книги"),
            UpsertOptions::without_images(),
            now,
        )
        .await
        .unwrap();
    assert!(open.lot.is_monitored);
    assert_eq!(open.lot.final_price, None);

    let mut sold = with_end(payload(2, 5), end);
    sold.status = LotStatus::Sold;
    sold.sold_quantity = 1;
    sold.price = 900.0;

    let settled = h
        .handler
        .upsert_at(&sold, &category(5, "Книги"), UpsertOptions::without_images(), end + Duration::hours(1))
        .await
        .unwrap();
    assert!(!settled.lot.is_monitored);
    assert_eq!(settled.lot.final_price, Some(900.0));
    assert_eq!(settled.lot.first_seen_at, open.lot.first_seen_at);
}

#[tokio::test]
async fn known_final_price_is_never_cleared() {
    let h = Harness::new();
    let end = Utc::now() - Duration::days(1);

    let mut sold = with_end(payload(3, 5), end);
    sold.status = LotStatus::Sold;
    sold.sold_quantity = 1;
    sold.final_price = Some(1200.0);
    h.handler
        .upsert(&sold, &category(5, "Книги"), UpsertOptions::without_images())
        .await
        .unwrap();

    // Upstream temporarily reports an open auction with no price.
    let gap = with_end(payload(3, 5), Utc::now() + Duration::days(1));
    let outcome = h
        .handler
        .upsert(&gap, &category(5, "Книги"), UpsertOptions::without_images())
        .await
        .unwrap();

    assert_eq!(outcome.lot.final_price, Some(1200.0));
    assert!(!outcome.lot.is_monitored);
}

#[tokio::test]
async fn less_valuable_lots_are_never_archived() {
    let h = Harness::new();
    let p = with_pictures(payload(4, 5), &["/i/1.jpg", "/i/2.jpg"]);

    let outcome = h
        .handler
        .upsert(
            &p,
            &category(5, "Книги"),
            UpsertOptions {
                download_images: true,
                is_less_valuable: true,
            },
        )
        .await
        .unwrap();

    assert!(!outcome.archived);
    assert!(outcome.lot.is_less_valuable);
    assert!(!outcome.lot.is_images_compressed);
    assert_eq!(outcome.lot.image_archive_url, None);
    assert_eq!(h.fetcher.calls(), 0);
    assert!(!h.archive_dir().join(archive_key(4)).exists());
}

#[tokio::test]
async fn less_valuable_flag_drops_previous_archive() {
    let h = Harness::new();
    let p = with_pictures(payload(5, 5), &["/i/1.jpg"]);

    let archived = h
        .handler
        .upsert(&p, &category(5, "Книги"), UpsertOptions::with_images())
        .await
        .unwrap();
    assert!(archived.lot.is_images_compressed);

    let demoted = h
        .handler
        .upsert(&p, &category(5, "Книги"), UpsertOptions::less_valuable())
        .await
        .unwrap();
    assert!(!demoted.lot.is_images_compressed);
    assert_eq!(demoted.lot.image_archive_url, None);

    let stored = h.repository.find_lot(5).await.unwrap().unwrap();
    assert_eq!(stored.image_archive_url, None);
}

#[tokio::test]
async fn partial_image_failure_still_archives() {
    let h = Harness::new();
    let p = with_pictures(
        payload(6, 5),
        &[
            "/i/a.jpg",
            "/i/b.jpg",
            "/i/broken.jpg",
            "https://cdn.auction.test/i/d.jpg",
            "/i/e.jpg?size=large",
        ],
    );

    let outcome = h
        .handler
        .upsert(&p, &category(5, "Книги"), UpsertOptions::with_images())
        .await
        .unwrap();

    assert!(outcome.archived);
    let location = outcome.lot.image_archive_url.clone().unwrap();
    let entries = list_entries(&std::fs::read(&location).unwrap()).unwrap();
    let images: Vec<_> = entries.iter().filter(|e| e.starts_with("images/")).collect();
    assert_eq!(images.len(), 4);
    assert!(entries.iter().all(|e| !e.contains("broken")));
    assert!(entries.contains(&"images/004_e.jpg".to_string()));

    // Four good images once each, the broken one three times.
    assert_eq!(h.fetcher.calls(), 7);

    let stored = h.repository.find_lot(6).await.unwrap().unwrap();
    assert!(stored.is_images_compressed);
    assert!(stored.archived_at.is_some());
}

#[tokio::test]
async fn every_image_failing_leaves_lot_unarchived() {
    let h = Harness::new();
    let p = with_pictures(payload(7, 5), &["/i/broken-1.jpg", "/i/broken-2.jpg"]);

    let outcome = h
        .handler
        .upsert(&p, &category(5, "Книги"), UpsertOptions::with_images())
        .await
        .unwrap();

    assert!(!outcome.archived);
    let stored = h.repository.find_lot(7).await.unwrap().unwrap();
    assert!(!stored.is_images_compressed);
    assert_eq!(stored.image_archive_url, None);
}

#[tokio::test]
async fn repository_failure_carries_lot_id() {
    let h = Harness::new();
    h.repository.set_fail_writes(true);

    let err = h
        .handler
        .upsert(&payload(8, 5), &category(5, "Книги"), UpsertOptions::without_images())
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::Repository { lot_id: 8, .. }));
    assert_eq!(err.lot_id(), 8);
    assert!(err.to_string().contains("lot 8"));
}

#[tokio::test]
async fn description_failure_fails_the_lot() {
    let h = Harness::new();
    h.marketplace.fail_description(9);

    let err = h
        .handler
        .upsert(&payload(9, 5), &category(5, "Книги"), UpsertOptions::without_images())
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::Marketplace { lot_id: 9, .. }));
    assert!(h.repository.is_empty().await);
}

#[tokio::test]
async fn refresh_of_missing_lot_is_none() {
    let h = Harness::new();
    let outcome = h
        .handler
        .refresh(404, None, UpsertOptions::without_images())
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn refresh_keeps_stored_category() {
    let h = Harness::new();
    h.handler
        .upsert(
            &payload(10, 21),
            &category(20, "Букинистика"),
            UpsertOptions::without_images(),
        )
        .await
        .unwrap();
    h.marketplace.put_lot(payload(10, 21));
    h.marketplace.put_lot(payload(11, 21));

    let kept = h
        .handler
        .refresh(10, None, UpsertOptions::without_images())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.lot.category_id, 20);
    assert_eq!(kept.lot.category_name, "Букинистика");

    // A lot never stored takes what the payload reports.
    let fresh = h
        .handler
        .refresh(11, None, UpsertOptions::without_images())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.lot.category_id, 21);
    assert_eq!(fresh.lot.category_name, "Category 21");

    let ids: Vec<_> = h
        .repository
        .categories()
        .await
        .into_iter()
        .map(|c| c.category_id)
        .collect();
    assert_eq!(ids, vec![20, 21]);
}
