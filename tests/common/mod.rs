use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use campaign_service::{
    clients::messaging::MessagingProvider,
    error::{ProviderError, ProviderErrorCode, StoreError},
    models::{
        audit::CreateDeliveryLog,
        campaign::{Campaign, CampaignCounters, CampaignListQuery, CampaignPatch, CampaignStatus},
        dispatch::{MulticastResponse, SendResponse},
        filter::AudienceFilter,
        notification::NotificationPayload,
        recipient::Recipient,
    },
    services::{
        audience::AudienceResolver,
        dispatcher::{DispatchSettings, MessageDispatcher},
        fanout::NotificationFanOut,
        orchestrator::CampaignOrchestrator,
        recorder::DeliveryRecorder,
        scheduler::CampaignScheduler,
    },
    store::{CampaignStore, DeliveryStore, RecipientStore, StoreResult},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Builds a device token that passes shape validation.
pub fn token_for(user_id: &str) -> String {
    format!("{}:APA91bHtestdevicetoken0123456789", user_id)
}

#[derive(Debug, Clone)]
pub struct FakeUser {
    pub user_id: String,
    pub fcm_token: Option<String>,
    pub notifications_enabled: bool,
    pub is_premium: bool,
    pub age: Option<i32>,
}

impl FakeUser {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            fcm_token: Some(token_for(user_id)),
            notifications_enabled: true,
            is_premium: false,
            age: None,
        }
    }
}

#[derive(Default)]
struct StoreState {
    users: Vec<FakeUser>,
    campaigns: BTreeMap<Uuid, Campaign>,
    status_history: HashMap<Uuid, Vec<CampaignStatus>>,
    logs: Vec<CreateDeliveryLog>,
    fail_audit: bool,
}

/// In-memory stand-in for the relational store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn with_users(users: Vec<FakeUser>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().users = users;
        store
    }

    pub fn fail_audit_writes(&self) {
        self.state.lock().unwrap().fail_audit = true;
    }

    pub fn token_of(&self, user_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .and_then(|u| u.fcm_token.clone())
    }

    pub fn logs(&self) -> Vec<CreateDeliveryLog> {
        self.state.lock().unwrap().logs.clone()
    }

    pub fn status_history(&self, id: Uuid) -> Vec<CampaignStatus> {
        self.state
            .lock()
            .unwrap()
            .status_history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn campaign(&self, id: Uuid) -> Option<Campaign> {
        self.state.lock().unwrap().campaigns.get(&id).cloned()
    }

    fn transition(state: &mut StoreState, id: Uuid, status: CampaignStatus) {
        if let Some(campaign) = state.campaigns.get_mut(&id) {
            campaign.status = status;
            state.status_history.entry(id).or_default().push(status);
        }
    }
}

fn matches_filter(user: &FakeUser, filter: &AudienceFilter) -> bool {
    match filter {
        AudienceFilter::All => true,
        AudienceFilter::Premium => user.is_premium,
        AudienceFilter::AgeRange { min_age, max_age } => match user.age {
            Some(age) => {
                min_age.is_none_or(|min| age >= min) && max_age.is_none_or(|max| age <= max)
            }
            None => false,
        },
        AudienceFilter::ByIds { user_ids } => user_ids.contains(&user.user_id),
        AudienceFilter::Custom { .. } => false,
    }
}

#[async_trait]
impl RecipientStore for InMemoryStore {
    async fn query_recipients(&self, filter: &AudienceFilter) -> StoreResult<Vec<Recipient>> {
        if let AudienceFilter::Custom { .. } = filter {
            return Err(StoreError::Backend(
                "custom predicates need a SQL backend".to_string(),
            ));
        }

        let state = self.state.lock().unwrap();
        let mut recipients: Vec<Recipient> = state
            .users
            .iter()
            .filter(|u| u.notifications_enabled && matches_filter(u, filter))
            .filter_map(|u| {
                u.fcm_token
                    .as_ref()
                    .filter(|token| !token.is_empty())
                    .map(|token| Recipient {
                        user_id: u.user_id.clone(),
                        device_token: token.clone(),
                        email: None,
                        display_name: None,
                    })
            })
            .collect();
        recipients.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(recipients)
    }
}

#[async_trait]
impl DeliveryStore for InMemoryStore {
    async fn insert_delivery_logs(&self, logs: &[CreateDeliveryLog]) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        if state.fail_audit {
            return Err(StoreError::Backend("audit table unavailable".to_string()));
        }
        state.logs.extend_from_slice(logs);
        Ok(logs.len() as u64)
    }

    async fn clear_device_tokens(&self, tokens: &[String]) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0;
        for user in state.users.iter_mut() {
            if user.fcm_token.as_ref().is_some_and(|t| tokens.contains(t)) {
                user.fcm_token = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<Campaign> {
        let mut state = self.state.lock().unwrap();
        state.campaigns.insert(campaign.id, campaign.clone());
        state
            .status_history
            .insert(campaign.id, vec![campaign.status]);
        Ok(campaign.clone())
    }

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        Ok(self.campaign(id))
    }

    async fn list_campaigns(&self, query: &CampaignListQuery) -> StoreResult<(Vec<Campaign>, u64)> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Campaign> = state
            .campaigns
            .values()
            .filter(|c| query.status.is_none_or(|status| c.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>> {
        let mut state = self.state.lock().unwrap();
        let Some(campaign) = state.campaigns.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = &patch.campaign_name {
            campaign.campaign_name = name.clone();
        }
        if let Some(title) = &patch.title {
            campaign.title = title.clone();
        }
        if let Some(body) = &patch.body {
            campaign.body = body.clone();
        }
        if let Some(data) = &patch.data {
            campaign.data = data.clone();
        }
        if let Some(filter) = &patch.filter_criteria {
            campaign.filter_criteria = filter.clone();
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            campaign.scheduled_at = scheduled_at;
        }
        let updated = campaign.clone();

        if let Some(status) = patch.status {
            Self::transition(&mut state, id, status);
            return Ok(state.campaigns.get(&id).cloned());
        }
        Ok(Some(updated))
    }

    async fn delete_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        Ok(self.state.lock().unwrap().campaigns.remove(&id))
    }

    async fn mark_sending(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(campaign) = state.campaigns.get_mut(&id) {
            campaign.sent_at = Some(sent_at);
        }
        Self::transition(&mut state, id, CampaignStatus::Sending);
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, counters: CampaignCounters) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(campaign) = state.campaigns.get_mut(&id) {
            campaign.total_recipients = Some(counters.total_recipients as i32);
            campaign.successful_sends = Some(counters.successful_sends as i32);
            campaign.failed_sends = Some(counters.failed_sends as i32);
        }
        Self::transition(&mut state, id, CampaignStatus::Sent);
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::transition(&mut state, id, status);
        Ok(())
    }

    async fn due_campaigns(&self, now: DateTime<Utc>) -> StoreResult<Vec<Campaign>> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<Campaign> = state
            .campaigns
            .values()
            .filter(|c| {
                c.status == CampaignStatus::Scheduled && c.scheduled_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_at);
        Ok(due)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    One,
    Multicast,
}

#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub kind: CallKind,
    pub size: usize,
    pub at: Instant,
}

/// Scriptable messaging provider that records every call.
#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<ProviderCall>>,
    invalid: HashSet<String>,
    transient: HashSet<String>,
    fail_multicast: bool,
    latency: Duration,
    sequence: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unregistered(mut self, token: String) -> Self {
        self.invalid.insert(token);
        self
    }

    pub fn with_transient_failure(mut self, token: String) -> Self {
        self.transient.insert(token);
        self
    }

    pub fn failing_multicast(mut self) -> Self {
        self.fail_multicast = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gaps(&self) -> Vec<Duration> {
        self.calls()
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }

    async fn record(&self, kind: CallKind, size: usize) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().unwrap().push(ProviderCall {
            kind,
            size,
            at: Instant::now(),
        });
    }

    fn outcome(&self, token: &str) -> Result<String, ProviderError> {
        if self.invalid.contains(token) {
            return Err(ProviderError::new(
                ProviderErrorCode::RegistrationTokenNotRegistered,
                "Requested entity was not found.",
            ));
        }
        if self.transient.contains(token) {
            return Err(ProviderError::new(
                ProviderErrorCode::Unavailable,
                "The service is currently unavailable.",
            ));
        }
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(format!("projects/test-project/messages/{}", n))
    }
}

#[async_trait]
impl MessagingProvider for FakeProvider {
    async fn send_one(
        &self,
        token: &str,
        _payload: &NotificationPayload,
    ) -> Result<String, ProviderError> {
        self.record(CallKind::One, 1).await;
        self.outcome(token)
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        _payload: &NotificationPayload,
    ) -> Result<MulticastResponse, ProviderError> {
        self.record(CallKind::Multicast, tokens.len()).await;
        if self.fail_multicast {
            return Err(ProviderError::new(
                ProviderErrorCode::Authentication,
                "Request had invalid authentication credentials.",
            ));
        }

        let responses = tokens
            .iter()
            .map(|token| match self.outcome(token) {
                Ok(message_id) => SendResponse::delivered(message_id),
                Err(error) => SendResponse::failed(error),
            })
            .collect();
        Ok(MulticastResponse::from_responses(responses))
    }
}

pub fn quick_settings() -> DispatchSettings {
    DispatchSettings {
        batch_size: 500,
        batch_delay: Duration::ZERO,
    }
}

/// Fully wired pipeline over the in-memory store and fake provider.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub fanout: Arc<NotificationFanOut>,
    pub campaigns: Arc<CampaignOrchestrator>,
    pub scheduler: Arc<CampaignScheduler>,
}

impl Harness {
    pub fn new(users: Vec<FakeUser>, provider: FakeProvider) -> Self {
        let store = Arc::new(InMemoryStore::with_users(users));
        let provider = Arc::new(provider);

        let fanout = Arc::new(NotificationFanOut::new(
            AudienceResolver::new(store.clone(), false),
            MessageDispatcher::new(provider.clone(), quick_settings()),
            DeliveryRecorder::new(store.clone()),
        ));
        let campaigns = Arc::new(CampaignOrchestrator::new(store.clone(), fanout.clone()));
        let scheduler = Arc::new(CampaignScheduler::new(store.clone(), campaigns.clone()));

        Self {
            store,
            provider,
            fanout,
            campaigns,
            scheduler,
        }
    }
}
