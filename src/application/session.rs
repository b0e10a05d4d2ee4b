use crate::domain::bill::SplitPolicy;
use crate::domain::money::Amount;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A bill being assembled over a multi-step chat exchange: the creator has
/// named the bill and amount and still has to pick the members.
#[derive(Debug, Clone, PartialEq)]
pub struct BillDraft {
    pub group_id: String,
    pub creator_id: String,
    pub title: String,
    pub total: Amount,
    pub policy: SplitPolicy,
}

/// Short-lived per-(group, creator) storage for bill drafts.
///
/// Each draft carries an explicit expiry; stale entries are purged on every
/// access, so abandoned creation flows never accumulate for the lifetime of
/// the process.
pub struct DraftSessions {
    ttl: Duration,
    drafts: Arc<RwLock<HashMap<(String, String), (Instant, BillDraft)>>>,
}

impl DraftSessions {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            drafts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Starts (or restarts) a draft for its (group, creator) pair.
    pub async fn begin(&self, draft: BillDraft) {
        let key = (draft.group_id.clone(), draft.creator_id.clone());
        let mut drafts = self.drafts.write().await;
        Self::purge(&mut drafts, self.ttl);
        drafts.insert(key, (Instant::now(), draft));
    }

    /// Removes and returns the draft for this (group, creator) pair, if one
    /// exists and has not expired.
    pub async fn take(&self, group_id: &str, creator_id: &str) -> Option<BillDraft> {
        let mut drafts = self.drafts.write().await;
        Self::purge(&mut drafts, self.ttl);
        drafts
            .remove(&(group_id.to_string(), creator_id.to_string()))
            .map(|(_, draft)| draft)
    }

    fn purge(drafts: &mut HashMap<(String, String), (Instant, BillDraft)>, ttl: Duration) {
        let now = Instant::now();
        drafts.retain(|_, (started, _)| now.duration_since(*started) < ttl);
    }
}

impl Default for DraftSessions {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
