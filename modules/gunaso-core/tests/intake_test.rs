mod common;

use std::time::Duration;

use gunaso_common::geo::destination;
use gunaso_common::{ComplaintStatus, GunasoError, Identity, ImageRef};
use gunaso_core::{DraftDecision, DraftResolution, SubmissionOutcome, SubmissionRequest};
use gunaso_store::ComplaintStore;

use common::*;

fn request(at: gunaso_common::GeoPoint, tags: &[&str], image: ImageRef) -> SubmissionRequest {
    SubmissionRequest::builder()
        .description("Garbage dumped by the road")
        .location(at)
        .tags(tags.iter().map(|t| t.to_string()).collect())
        .image(image)
        .build()
}

/// Files one complaint at WARD_1_POINT and stages a similar draft for a
/// second citizen. Returns (existing complaint id, second citizen, draft image).
async fn staged_duplicate(h: &Harness) -> (uuid::Uuid, Identity, ImageRef) {
    let existing = h.file(user(), WARD_1_POINT, &["garbage"]).await;
    let second = Identity::citizen(user());
    let image = h.upload().await;

    let outcome = h
        .core
        .intake
        .submit(
            &second,
            request(destination(WARD_1_POINT, 90.0, 50.0), &["garbage"], image.clone()),
        )
        .await
        .unwrap();
    match outcome {
        SubmissionOutcome::SimilarFound { draft_key, candidates } => {
            assert_eq!(draft_key, format!("draft:complaint:{}", second.user_id));
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].id, existing.id);
        }
        other => panic!("expected a staged draft, got {other:?}"),
    }
    (existing.id, second, image)
}

#[tokio::test]
async fn first_submission_files_directly() {
    let h = harness().await;
    let citizen = Identity::citizen(user());
    let image = h.upload().await;

    let outcome = h
        .core
        .intake
        .submit(&citizen, request(WARD_1_POINT, &["garbage"], image.clone()))
        .await
        .unwrap();

    let SubmissionOutcome::Filed(complaint) = outcome else {
        panic!("expected a filed complaint");
    };
    assert_eq!(complaint.ward_id, 1);
    assert_eq!(complaint.status, ComplaintStatus::Registered);
    assert_eq!(complaint.user_id, citizen.user_id);
    assert_eq!(complaint.image, image);
    assert_eq!(complaint.description, "Garbage dumped by the road");
}

#[tokio::test]
async fn submission_outside_all_wards_is_rejected() {
    let h = harness().await;
    let image = h.upload().await;
    let err = h
        .core
        .intake
        .submit(
            &Identity::citizen(user()),
            request(OUTSIDE_POINT, &["garbage"], image),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::LocationOutOfBounds));
    assert_eq!(h.store.complaint_count(), 0);
}

#[tokio::test]
async fn submission_validation() {
    let h = harness().await;
    let citizen = Identity::citizen(user());

    let no_tags = h
        .core
        .intake
        .submit(&citizen, request(WARD_1_POINT, &[], h.upload().await))
        .await
        .unwrap_err();
    assert!(matches!(no_tags, GunasoError::InvalidTags(_)));

    let unknown_tag = h
        .core
        .intake
        .submit(&citizen, request(WARD_1_POINT, &["aliens"], h.upload().await))
        .await
        .unwrap_err();
    assert!(matches!(unknown_tag, GunasoError::InvalidTags(_)));

    let no_image = SubmissionRequest::builder()
        .description("Pothole")
        .location(WARD_1_POINT)
        .tags(vec!["potholes".into()])
        .build();
    let err = h.core.intake.submit(&citizen, no_image).await.unwrap_err();
    assert!(matches!(err, GunasoError::MissingImage));

    let admin = Identity::ward_admin(user(), 1);
    let err = h
        .core
        .intake
        .submit(&admin, request(WARD_1_POINT, &["garbage"], h.upload().await))
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::Unauthorized(_)));
}

#[tokio::test]
async fn bypassing_dedup_files_next_to_a_similar_complaint() {
    let h = harness().await;
    h.file(user(), WARD_1_POINT, &["garbage"]).await;

    let mut req = request(WARD_1_POINT, &["garbage"], h.upload().await);
    req.bypass_dedup = true;
    let outcome = h
        .core
        .intake
        .submit(&Identity::citizen(user()), req)
        .await
        .unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Filed(_)));
    assert_eq!(h.store.complaint_count(), 2);
}

#[tokio::test]
async fn supporting_from_a_draft_releases_its_image_and_files_nothing() {
    let h = harness().await;
    let (existing, second, image) = staged_duplicate(&h).await;

    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap();
    assert_eq!(
        resolution,
        DraftResolution::Supported {
            complaint_id: existing,
            orphaned_image: None,
        }
    );

    assert_eq!(h.images.deletions(), vec![image.clone()]);
    assert!(!h.images.contains(&image));
    assert_eq!(h.store.complaint_count(), 1);
    assert_eq!(h.store.supporters(existing).await.unwrap().len(), 2);
}

#[tokio::test]
async fn filing_anyway_keeps_the_image() {
    let h = harness().await;
    let (_, second, image) = staged_duplicate(&h).await;

    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap();
    let DraftResolution::Filed(complaint) = resolution else {
        panic!("expected a filed complaint");
    };
    assert_eq!(complaint.image, image);
    assert_eq!(complaint.user_id, second.user_id);
    assert_eq!(complaint.ward_id, 1);

    assert!(h.images.deletions().is_empty());
    assert!(h.images.contains(&image));
    assert_eq!(h.store.complaint_count(), 2);
}

#[tokio::test]
async fn supporting_a_complaint_that_was_not_offered_is_not_found() {
    let h = harness().await;
    let (_, second, _) = staged_duplicate(&h).await;
    let elsewhere = h.file(user(), WARD_2_POINT, &["garbage"]).await;

    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(elsewhere.id))
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::NotFound(_)));

    // The draft survives a wrong pick.
    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap();
    assert!(matches!(resolution, DraftResolution::Filed(_)));
}

#[tokio::test]
async fn draft_is_consumed_by_its_resolution() {
    let h = harness().await;
    let (existing, second, _) = staged_duplicate(&h).await;

    h.core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap();
    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::DraftExpiredOrMissing));
}

#[tokio::test(start_paused = true)]
async fn expired_draft_cannot_be_resolved() {
    let h = harness().await;
    let (existing, second, _) = staged_duplicate(&h).await;

    tokio::time::advance(Duration::from_secs(301)).await;

    for decision in [DraftDecision::SupportExisting(existing), DraftDecision::FileAnyway] {
        let err = h
            .core
            .intake
            .resolve_draft(&second, decision)
            .await
            .unwrap_err();
        assert!(matches!(err, GunasoError::DraftExpiredOrMissing));
    }
    assert_eq!(h.store.complaint_count(), 1);
}

#[tokio::test]
async fn release_failure_is_reported_as_an_orphan() {
    let h = harness().await;
    let (existing, second, image) = staged_duplicate(&h).await;
    h.images.fail_deletes(true);

    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap();
    assert_eq!(
        resolution,
        DraftResolution::Supported {
            complaint_id: existing,
            orphaned_image: Some(image.clone()),
        }
    );
    assert!(h.images.contains(&image));
}

#[tokio::test]
async fn duplicate_support_from_a_draft_still_releases_the_image() {
    let h = harness().await;
    let (existing, second, image) = staged_duplicate(&h).await;
    h.core
        .lifecycle
        .support_existing(second.user_id, existing)
        .await
        .unwrap();

    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::DuplicateSupport(id) if id == existing));
    assert_eq!(h.images.deletions(), vec![image]);
}

#[tokio::test]
async fn filing_anyway_can_be_retried_after_a_store_outage() {
    let h = harness().await;
    let (_, second, image) = staged_duplicate(&h).await;

    h.store.fail_next_writes(1);
    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.store.complaint_count(), 1);
    assert!(h.images.contains(&image));
    assert!(h.images.deletions().is_empty());

    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap();
    let DraftResolution::Filed(complaint) = resolution else {
        panic!("expected a filed complaint");
    };
    assert_eq!(complaint.image, image);
    assert_eq!(h.store.complaint_count(), 2);

    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::FileAnyway)
        .await
        .unwrap_err();
    assert!(matches!(err, GunasoError::DraftExpiredOrMissing));
}

#[tokio::test]
async fn supporting_from_a_draft_can_be_retried_after_a_store_outage() {
    let h = harness().await;
    let (existing, second, image) = staged_duplicate(&h).await;

    h.store.fail_next_writes(1);
    let err = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.store.supporters(existing).await.unwrap().len(), 1);
    assert!(h.images.deletions().is_empty());

    let resolution = h
        .core
        .intake
        .resolve_draft(&second, DraftDecision::SupportExisting(existing))
        .await
        .unwrap();
    assert!(matches!(resolution, DraftResolution::Supported { orphaned_image: None, .. }));
    assert_eq!(h.images.deletions(), vec![image]);
    assert_eq!(h.store.supporters(existing).await.unwrap().len(), 2);
}
