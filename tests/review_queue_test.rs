//! Lifecycle tests for the review queue against an in-memory archive.

mod fixtures;
mod helpers;

use std::time::Instant;

use bytes::Bytes;
use fixtures::*;
use futures::future::join_all;
use helpers::*;
use xray_review::imaging::FractureParams;
use xray_review::models::job::{CarouselSide, ConfirmAction, JobId, OwnerRef, ResultOption};
use xray_review::services::review_queue::ReviewError;
use xray_review::services::storage::StorageKind;

fn result(tag: &str) -> Bytes {
    Bytes::from(tag.as_bytes().to_vec())
}

#[tokio::test]
async fn test_dequeue_is_fifo_across_jobs() {
    let (queue, _) = queue_with_storage(1, 5);
    let a = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let b = queue.submit(new_job("b", OwnerRef::Slot(1))).await;

    assert_eq!(queue.dequeue().await.unwrap().id, a);
    assert_eq!(queue.dequeue().await.unwrap().id, b);
    assert!(queue.dequeue().await.is_none());
}

#[tokio::test]
async fn test_job_dispatched_once_per_quota_unit() {
    let (queue, _) = queue_with_storage(2, 5);
    let c = queue.submit(new_job("c", OwnerRef::Slot(1))).await;

    let first = queue.dequeue().await.unwrap();
    assert_eq!(first.id, c);
    assert_eq!(first.remaining_dispatches, 1);
    let second = queue.dequeue().await.unwrap();
    assert_eq!(second.id, c);
    assert_eq!(second.remaining_dispatches, 0);
    assert!(queue.dequeue().await.is_none());

    // Dispatch-exhausted jobs stay reviewable.
    assert_eq!(queue.awaiting_count().await, 1);
}

#[tokio::test]
async fn test_quota_exhausts_before_next_job() {
    let (queue, _) = queue_with_storage(3, 5);
    let a = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let b = queue.submit(new_job("b", OwnerRef::Slot(1))).await;

    let order: Vec<JobId> = {
        let mut ids = Vec::new();
        while let Some(job) = queue.dequeue().await {
            ids.push(job.id);
        }
        ids
    };
    assert_eq!(order, vec![a, a, a, b, b, b]);
}

#[tokio::test]
async fn test_unknown_ids_fail_without_side_effects() {
    let (queue, storage) = queue_with_storage(1, 5);
    let known = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let unknown = JobId(99);

    assert!(matches!(
        queue.submit_result(unknown, result("r")).await,
        Err(ReviewError::NotFound(id)) if id == unknown
    ));
    assert!(matches!(
        queue.confirm(unknown, 0, None).await,
        Err(ReviewError::NotFound(_))
    ));
    assert!(matches!(queue.retry(unknown).await, Err(ReviewError::NotFound(_))));
    assert!(matches!(queue.cancel(unknown).await, Err(ReviewError::NotFound(_))));
    assert!(matches!(
        queue
            .composite_overlay(unknown, 0, b"overlay", FractureParams {
                x: 0,
                y: 0,
                scale: 1.0,
                noise_std: 0.0
            })
            .await,
        Err(ReviewError::NotFound(_))
    ));

    assert_eq!(queue.queue_depth().await, 1);
    assert_eq!(queue.awaiting_count().await, 1);
    assert!(storage.objects().is_empty());
    assert_eq!(queue.dequeue().await.unwrap().id, known);
}

#[tokio::test]
async fn test_results_keep_submission_order() {
    let (queue, _) = queue_with_storage(2, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.submit_result(id, result("first")).await.unwrap();
    queue.submit_result(id, result("second")).await.unwrap();

    assert_eq!(
        queue.result_image(id, ResultOption::Choice(0)).await.unwrap(),
        result("first")
    );
    assert_eq!(
        queue.result_image(id, ResultOption::Choice(1)).await.unwrap(),
        result("second")
    );
    assert_eq!(
        queue.result_image(id, ResultOption::Original).await.unwrap(),
        result("a")
    );
    assert!(matches!(
        queue.result_image(id, ResultOption::Choice(2)).await,
        Err(ReviewError::InvalidChoice { available: 2, .. })
    ));
}

#[tokio::test]
async fn test_retry_resets_quota_and_results() {
    let (queue, _) = queue_with_storage(2, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.dequeue().await.unwrap();
    queue.dequeue().await.unwrap();
    queue.submit_result(id, result("r0")).await.unwrap();

    queue.retry(id).await.unwrap();

    let pending = queue.list_pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].job_id, id);
    assert_eq!(pending[0].result_count, 0);
    assert_eq!(pending[0].remaining_dispatches, 2);
    assert_eq!(queue.queue_depth().await, 1);

    assert_eq!(queue.dequeue().await.unwrap().id, id);
    assert_eq!(queue.dequeue().await.unwrap().id, id);
    assert!(queue.dequeue().await.is_none());
}

#[tokio::test]
async fn test_retry_goes_behind_older_jobs() {
    let (queue, _) = queue_with_storage(1, 5);
    let a = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let b = queue.submit(new_job("b", OwnerRef::Slot(1))).await;
    assert_eq!(queue.dequeue().await.unwrap().id, a);

    queue.retry(a).await.unwrap();

    assert_eq!(queue.dequeue().await.unwrap().id, b);
    assert_eq!(queue.dequeue().await.unwrap().id, a);
}

#[tokio::test]
async fn test_cancel_removes_job_everywhere() {
    let (queue, storage) = queue_with_storage(2, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.submit_result(id, result("r")).await.unwrap();

    queue.cancel(id).await.unwrap();

    assert_eq!(queue.queue_depth().await, 0);
    assert_eq!(queue.awaiting_count().await, 0);
    assert!(queue.dequeue().await.is_none());
    assert!(matches!(
        queue.submit_result(id, result("late")).await,
        Err(ReviewError::NotFound(_))
    ));
    assert!(storage.objects().is_empty());
    assert!(queue.list_carousel().await.is_empty());
}

#[tokio::test]
async fn test_confirm_archives_original_then_result() {
    let (queue, storage) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("photo", OwnerRef::Slot(7))).await;
    queue.submit_result(id, result("xray-0")).await.unwrap();
    queue.submit_result(id, result("xray-1")).await.unwrap();

    queue.confirm(id, 1, None).await.unwrap();

    let objects = storage.objects();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].kind, StorageKind::Normal);
    assert_eq!(objects[0].filename, format!("{id}_original.png"));
    assert_eq!(objects[0].data, b"photo");
    assert_eq!(objects[0].owner, OwnerRef::Slot(7));
    assert_eq!(objects[1].kind, StorageKind::Xray);
    assert_eq!(objects[1].filename, format!("{id}_result.png"));
    assert_eq!(objects[1].data, b"xray-1");

    let carousel = queue.list_carousel().await;
    assert_eq!(carousel.len(), 1);
    assert_eq!(carousel[0].result, result("xray-1"));
    assert_eq!(carousel[0].original, result("photo"));
    assert_eq!(queue.awaiting_count().await, 0);
}

#[tokio::test]
async fn test_confirm_with_override_archives_override() {
    let (queue, storage) = queue_with_storage(1, 5);
    let id = queue
        .submit(new_job("photo", OwnerRef::Link("https://share.example/u/abc".to_string())))
        .await;
    queue.submit_result(id, result("worker")).await.unwrap();

    queue
        .confirm(id, 0, Some(result("reviewer-edit")))
        .await
        .unwrap();

    let objects = storage.objects();
    assert_eq!(objects[1].data, b"reviewer-edit");
    assert_eq!(
        objects[1].owner,
        OwnerRef::Link("https://share.example/u/abc".to_string())
    );
}

#[tokio::test]
async fn test_confirm_preempts_remaining_dispatches() {
    let (queue, _) = queue_with_storage(3, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.dequeue().await.unwrap();
    queue.submit_result(id, result("r")).await.unwrap();

    queue.confirm(id, 0, None).await.unwrap();

    assert_eq!(queue.queue_depth().await, 0);
    assert!(queue.dequeue().await.is_none());
}

#[tokio::test]
async fn test_confirm_rejects_out_of_range_choice() {
    let (queue, storage) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.submit_result(id, result("r")).await.unwrap();

    let err = queue.confirm(id, 1, None).await.unwrap_err();
    assert!(matches!(
        err,
        ReviewError::InvalidChoice { choice: 1, available: 1, .. }
    ));

    // Nothing was consumed; the job can still be confirmed properly.
    assert_eq!(queue.awaiting_count().await, 1);
    assert!(storage.objects().is_empty());
    queue.confirm(id, 0, None).await.unwrap();
}

#[tokio::test]
async fn test_archive_failure_is_not_rolled_back() {
    let (queue, storage) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.submit_result(id, result("r")).await.unwrap();
    storage.set_fail_uploads(true);

    let err = queue.confirm(id, 0, None).await.unwrap_err();
    assert!(matches!(err, ReviewError::Storage(_)));

    assert_eq!(queue.awaiting_count().await, 0);
    assert!(queue.list_carousel().await.is_empty());
    assert!(matches!(
        queue.confirm(id, 0, None).await,
        Err(ReviewError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_carousel_keeps_most_recent_entries() {
    let (queue, _) = queue_with_storage(1, 3);
    for tag in ["a", "b", "c", "d", "e"] {
        let id = queue.submit(new_job(tag, OwnerRef::Slot(1))).await;
        queue
            .submit_result(id, result(&format!("{tag}-xray")))
            .await
            .unwrap();
        queue.confirm(id, 0, None).await.unwrap();
    }

    let originals: Vec<Bytes> = queue
        .list_carousel()
        .await
        .into_iter()
        .map(|entry| entry.original)
        .collect();
    assert_eq!(originals, vec![result("e"), result("d"), result("c")]);
}

#[tokio::test]
async fn test_carousel_capacity_one_keeps_latest() {
    let (queue, _) = queue_with_storage(1, 1);
    let first = queue.submit(new_job("first", OwnerRef::Slot(1))).await;
    let second = queue.submit(new_job("second", OwnerRef::Slot(2))).await;
    queue.submit_result(first, result("x1")).await.unwrap();
    queue.submit_result(second, result("x2")).await.unwrap();

    queue.confirm(first, 0, None).await.unwrap();
    queue.confirm(second, 0, None).await.unwrap();

    let carousel = queue.list_carousel().await;
    assert_eq!(carousel.len(), 1);
    assert_eq!(carousel[0].original, result("second"));
    assert_eq!(
        queue.carousel_image(0, CarouselSide::Xray).await,
        Some(result("x2"))
    );
    assert_eq!(queue.carousel_image(1, CarouselSide::Original).await, None);
}

#[tokio::test]
async fn test_composite_rejects_invalid_choice_and_keeps_results() {
    let (queue, _) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let candidate = Bytes::from(png_bytes(&limb_image(40, 40)));
    queue.submit_result(id, candidate.clone()).await.unwrap();
    let overlay = overlay_png_bytes(&fracture_overlay(10, 10));
    let params = FractureParams {
        x: 5,
        y: 5,
        scale: 1.0,
        noise_std: 2.0,
    };

    let err = queue
        .composite_overlay(id, 1, &overlay, params)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidChoice { choice: 1, .. }));
    assert_eq!(
        queue.result_image(id, ResultOption::Choice(0)).await.unwrap(),
        candidate
    );
}

#[tokio::test]
async fn test_composite_replaces_candidate_in_place() {
    let (queue, _) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    let candidate = Bytes::from(png_bytes(&limb_image(40, 40)));
    queue.submit_result(id, candidate.clone()).await.unwrap();
    let overlay = overlay_png_bytes(&fracture_overlay(10, 10));

    queue
        .composite_overlay(
            id,
            0,
            &overlay,
            FractureParams {
                x: 15,
                y: 15,
                scale: 1.0,
                noise_std: 0.0,
            },
        )
        .await
        .unwrap();

    let updated = queue.result_image(id, ResultOption::Choice(0)).await.unwrap();
    let decoded = xray_review::imaging::pixel::decode_color(&updated).unwrap();
    assert_eq!(decoded.dimensions(), (40, 40));
    assert_ne!(decoded, limb_image(40, 40));
    assert_eq!(queue.list_pending().await[0].result_count, 1);
}

#[tokio::test]
async fn test_composite_rejects_undecodable_candidate() {
    let (queue, _) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
    queue.submit_result(id, result("not-a-png")).await.unwrap();
    let overlay = overlay_png_bytes(&fracture_overlay(4, 4));

    let err = queue
        .composite_overlay(
            id,
            0,
            &overlay,
            FractureParams {
                x: 0,
                y: 0,
                scale: 1.0,
                noise_std: 0.0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Decode(_)));
    assert_eq!(
        queue.result_image(id, ResultOption::Choice(0)).await.unwrap(),
        result("not-a-png")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_composite_does_not_block_the_runtime() {
    let (queue, _) = queue_with_storage(1, 5);
    let id = queue.submit(new_job("big", OwnerRef::Slot(1))).await;
    let candidate = Bytes::from(png_bytes(&limb_image(1024, 1024)));
    queue.submit_result(id, candidate).await.unwrap();
    let overlay = overlay_png_bytes(&fracture_overlay(400, 400));
    let params = FractureParams {
        x: 300,
        y: 300,
        scale: 1.0,
        noise_std: 20.0,
    };

    // On a single-threaded runtime the side task only gets polled before the
    // composite finishes if the pixel work is off the executor thread.
    let (composited_at, side_task_at) = tokio::join!(
        async {
            queue.composite_overlay(id, 0, &overlay, params).await.unwrap();
            Instant::now()
        },
        async {
            tokio::task::yield_now().await;
            Instant::now()
        }
    );
    assert!(side_task_at < composited_at);
}

#[tokio::test]
async fn test_composite_is_reproducible_for_a_seeded_queue() {
    let overlay = overlay_png_bytes(&fracture_overlay(12, 12));
    let params = FractureParams {
        x: 14,
        y: 14,
        scale: 1.0,
        noise_std: 30.0,
    };

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let (queue, _) = queue_with_storage(1, 5);
        let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;
        let candidate = Bytes::from(png_bytes(&limb_image(40, 40)));
        queue.submit_result(id, candidate).await.unwrap();
        queue.composite_overlay(id, 0, &overlay, params).await.unwrap();
        outputs.push(queue.result_image(id, ResultOption::Choice(0)).await.unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_resolve_dispatches_actions() {
    let (queue, storage) = queue_with_storage(1, 5);
    let keep = queue.submit(new_job("keep", OwnerRef::Slot(1))).await;
    let again = queue.submit(new_job("again", OwnerRef::Slot(1))).await;
    let dropped = queue.submit(new_job("drop", OwnerRef::Slot(1))).await;
    queue.submit_result(keep, result("k")).await.unwrap();

    queue
        .resolve(keep, ConfirmAction::Confirm, 0, None)
        .await
        .unwrap();
    queue
        .resolve(again, ConfirmAction::Retry, 0, None)
        .await
        .unwrap();
    queue
        .resolve(dropped, ConfirmAction::Cancel, 0, None)
        .await
        .unwrap();

    assert_eq!(storage.objects().len(), 2);
    let pending: Vec<JobId> = queue
        .list_pending()
        .await
        .into_iter()
        .map(|p| p.job_id)
        .collect();
    assert_eq!(pending, vec![again]);
}

#[tokio::test]
async fn test_concurrent_result_submissions_are_all_kept() {
    let (queue, _) = queue_with_storage(8, 5);
    let id = queue.submit(new_job("a", OwnerRef::Slot(1))).await;

    let submissions = (0..8).map(|i| queue.submit_result(id, result(&format!("r{i}"))));
    let outcomes = join_all(submissions).await;

    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(queue.list_pending().await[0].result_count, 8);
}
