use anyhow::Result;
use campaign_service::{
    error::ServiceError,
    models::{
        campaign::{CampaignListQuery, CampaignPatch, CampaignStatus, NewCampaign},
        filter::AudienceFilter,
        status::DeliveryStatus,
    },
};
use chrono::{Duration, Utc};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use crate::common::{FakeProvider, FakeUser, Harness, token_for};

fn new_campaign(filter: AudienceFilter) -> NewCampaign {
    NewCampaign {
        campaign_name: "Protein week".to_string(),
        title: "Hit your protein goal".to_string(),
        body: "Log three high-protein meals this week".to_string(),
        filter_criteria: filter,
        ..Default::default()
    }
}

fn users() -> Vec<FakeUser> {
    vec![
        FakeUser::new("u1"),
        FakeUser::new("u2"),
        FakeUser::new("u3"),
    ]
}

/// Test: Targeted campaign goes draft -> sending -> sent with one audit row per user
#[tokio::test]
async fn test_campaign_send_end_to_end() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());

    let request: NewCampaign = serde_json::from_value(json!({
        "campaignName": "Protein week",
        "title": "Hit your protein goal",
        "body": "Log three high-protein meals this week",
        "data": { "screen": "goals", "week": 12 },
        "filterCriteria": { "type": "userIds", "userIds": ["u1", "u2"] }
    }))?;
    let campaign = harness.campaigns.create(request).await?;
    assert_eq!(campaign.status, CampaignStatus::Draft);

    let summary = harness.campaigns.send(campaign.id).await?;

    assert_eq!(summary.total_recipients, 2);
    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.failed_count, 0);
    assert_eq!(
        harness.store.status_history(campaign.id),
        vec![
            CampaignStatus::Draft,
            CampaignStatus::Sending,
            CampaignStatus::Sent
        ]
    );

    let stored = harness.campaigns.get(campaign.id).await?;
    assert_eq!(stored.total_recipients, Some(2));
    assert_eq!(stored.successful_sends, Some(2));
    assert_eq!(stored.failed_sends, Some(0));
    assert!(stored.sent_at.is_some());

    let logs = harness.store.logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.status == DeliveryStatus::Sent));
    assert!(logs.iter().all(|log| log.campaign_id == Some(campaign.id)));
    assert!(logs.iter().all(|log| log.notification_type == "campaign"));
    assert_eq!(logs[0].data.get("week").map(String::as_str), Some("12"));

    Ok(())
}

/// Test: Partial failures still finish as sent with a nonzero failure count
#[tokio::test]
async fn test_partial_failure_still_marks_sent() -> Result<()> {
    let harness = Harness::new(
        users(),
        FakeProvider::new().with_unregistered(token_for("u3")),
    );
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let summary = harness.campaigns.send(campaign.id).await?;

    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.invalid_tokens_cleared, 1);

    let stored = harness.campaigns.get(campaign.id).await?;
    assert_eq!(stored.status, CampaignStatus::Sent);
    assert_eq!(stored.failed_sends, Some(1));

    Ok(())
}

/// Test: A campaign with no audience stays in sending and never reaches the provider
#[tokio::test]
async fn test_zero_recipient_campaign_stays_sending() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::Premium))
        .await?;

    let summary = harness.campaigns.send(campaign.id).await?;

    assert_eq!(summary.sent_count, 0);
    assert_eq!(summary.failed_count, 0);
    assert!(harness.provider.calls().is_empty());
    assert_eq!(
        harness.campaigns.get(campaign.id).await?.status,
        CampaignStatus::Sending
    );

    Ok(())
}

/// Test: A whole-chunk provider failure marks the campaign failed and surfaces the error
#[tokio::test]
async fn test_provider_failure_marks_campaign_failed() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new().failing_multicast());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let result = harness.campaigns.send(campaign.id).await;

    assert!(matches!(result, Err(ServiceError::Provider(_))));
    assert_eq!(
        harness.store.status_history(campaign.id),
        vec![
            CampaignStatus::Draft,
            CampaignStatus::Sending,
            CampaignStatus::Failed
        ]
    );

    Ok(())
}

/// Test: Sending a sent campaign again is rejected
#[tokio::test]
async fn test_sent_campaign_cannot_be_resent() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;
    harness.campaigns.send(campaign.id).await?;

    let result = harness.campaigns.send(campaign.id).await;

    assert!(matches!(result, Err(ServiceError::AlreadySent(id)) if id == campaign.id));
    Ok(())
}

/// Test: Creating a campaign directly in sent is rejected
#[tokio::test]
async fn test_create_in_sent_is_rejected() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let mut request = new_campaign(AudienceFilter::All);
    request.status = Some(CampaignStatus::Sent);

    let result = harness.campaigns.create(request).await;

    assert!(matches!(
        result,
        Err(ServiceError::InvalidTransition {
            to: CampaignStatus::Sent,
            ..
        })
    ));
    Ok(())
}

/// Test: scheduledAt at creation yields a scheduled campaign
#[tokio::test]
async fn test_create_with_schedule_is_scheduled() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let mut request = new_campaign(AudienceFilter::All);
    request.scheduled_at = Some(Utc::now() + Duration::hours(2));

    let campaign = harness.campaigns.create(request).await?;

    assert_eq!(campaign.status, CampaignStatus::Scheduled);
    assert_eq!(campaign.created_by, "system");
    Ok(())
}

/// Test: Any field edit on a sent campaign fails as immutable
#[tokio::test]
async fn test_sent_campaign_is_immutable() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;
    assert_ok!(harness.campaigns.send(campaign.id).await);

    let patch = CampaignPatch {
        title: Some("Edited after the fact".to_string()),
        ..Default::default()
    };
    let error = assert_err!(harness.campaigns.update(campaign.id, patch).await);

    assert!(matches!(error, ServiceError::CampaignImmutable(id) if id == campaign.id));
    Ok(())
}

/// Test: scheduled -> sent is allowed, sent -> scheduled is not
#[tokio::test]
async fn test_status_transitions_follow_table() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let mut request = new_campaign(AudienceFilter::All);
    request.scheduled_at = Some(Utc::now() + Duration::days(1));
    let campaign = harness.campaigns.create(request).await?;

    let to_sent = CampaignPatch {
        status: Some(CampaignStatus::Sent),
        ..Default::default()
    };
    let updated = harness.campaigns.update(campaign.id, to_sent).await?;
    assert_eq!(updated.status, CampaignStatus::Sent);

    let back = CampaignPatch {
        status: Some(CampaignStatus::Scheduled),
        ..Default::default()
    };
    let result = harness.campaigns.update(campaign.id, back).await;

    match result {
        Err(ServiceError::InvalidTransition { from, allowed, .. }) => {
            assert_eq!(from, "sent");
            assert!(allowed.is_empty());
        }
        other => panic!("expected InvalidTransition, got {:?}", other),
    }
    Ok(())
}

/// Test: draft -> sent skips the table and is rejected with the allowed set
#[tokio::test]
async fn test_draft_cannot_jump_to_sent() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let patch = CampaignPatch {
        status: Some(CampaignStatus::Sent),
        ..Default::default()
    };
    let result = harness.campaigns.update(campaign.id, patch).await;

    match result {
        Err(ServiceError::InvalidTransition { allowed, .. }) => {
            assert_eq!(allowed, vec![CampaignStatus::Scheduled]);
        }
        other => panic!("expected InvalidTransition, got {:?}", other),
    }
    Ok(())
}

/// Test: A failed campaign can be rescheduled and edited again
#[tokio::test]
async fn test_failed_campaign_can_be_rescheduled() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new().failing_multicast());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;
    let _ = harness.campaigns.send(campaign.id).await;

    let patch: CampaignPatch = serde_json::from_value(json!({
        "status": "scheduled",
        "scheduledAt": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        "title": "Second attempt"
    }))?;
    let updated = harness.campaigns.update(campaign.id, patch).await?;

    assert_eq!(updated.status, CampaignStatus::Scheduled);
    assert_eq!(updated.title, "Second attempt");
    Ok(())
}

/// Test: Empty patches and unknown ids are rejected
#[tokio::test]
async fn test_update_rejects_empty_patch_and_unknown_id() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let empty = harness
        .campaigns
        .update(campaign.id, CampaignPatch::default())
        .await;
    assert!(matches!(empty, Err(ServiceError::Validation(_))));

    let missing = harness
        .campaigns
        .update(
            uuid::Uuid::new_v4(),
            CampaignPatch {
                title: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound { .. })));
    Ok(())
}

/// Test: Listing filters by status and clamps the page size
#[tokio::test]
async fn test_list_filters_and_clamps() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    for _ in 0..3 {
        harness
            .campaigns
            .create(new_campaign(AudienceFilter::All))
            .await?;
    }
    let mut scheduled = new_campaign(AudienceFilter::All);
    scheduled.scheduled_at = Some(Utc::now() + Duration::hours(3));
    harness.campaigns.create(scheduled).await?;

    let page = harness
        .campaigns
        .list(CampaignListQuery {
            status: Some(CampaignStatus::Draft),
            limit: 10_000,
            offset: 0,
        })
        .await?;

    assert_eq!(page.total, 3);
    assert_eq!(page.limit, 200);
    assert!(
        page.campaigns
            .iter()
            .all(|c| c.status == CampaignStatus::Draft)
    );
    Ok(())
}

/// Test: Deleting a campaign returns it and later lookups fail
#[tokio::test]
async fn test_delete_campaign() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let deleted = harness.campaigns.delete(campaign.id).await?;
    assert_eq!(deleted.id, campaign.id);

    let result = harness.campaigns.get(campaign.id).await;
    assert!(matches!(result, Err(ServiceError::NotFound { entity: "campaign", .. })));
    Ok(())
}

/// Test: Clearing scheduledAt on a scheduled campaign is rejected and leaves it untouched
#[tokio::test]
async fn test_scheduled_campaign_cannot_drop_its_schedule() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let mut request = new_campaign(AudienceFilter::All);
    request.scheduled_at = Some(Utc::now() + Duration::hours(4));
    let campaign = harness.campaigns.create(request).await?;

    let patch: CampaignPatch = serde_json::from_value(json!({ "scheduledAt": null }))?;
    let result = harness.campaigns.update(campaign.id, patch).await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    let stored = harness.campaigns.get(campaign.id).await?;
    assert_eq!(stored.status, CampaignStatus::Scheduled);
    assert_eq!(stored.scheduled_at, campaign.scheduled_at);

    Ok(())
}

/// Test: A draft can still clear a schedule it never needed
#[tokio::test]
async fn test_draft_can_clear_scheduled_at() -> Result<()> {
    let harness = Harness::new(users(), FakeProvider::new());
    let campaign = harness
        .campaigns
        .create(new_campaign(AudienceFilter::All))
        .await?;

    let patch = CampaignPatch {
        scheduled_at: Some(None),
        ..Default::default()
    };
    let updated = harness.campaigns.update(campaign.id, patch).await?;

    assert_eq!(updated.status, CampaignStatus::Draft);
    assert_eq!(updated.scheduled_at, None);
    Ok(())
}
