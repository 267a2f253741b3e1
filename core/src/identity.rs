//! Identifier mapping: one opaque analytics id per source member.
//!
//! RULE: The map is rebuilt from scratch on every run and is read-only
//! once built. Only the link store ever persists it; the analytics store
//! sees analytics ids alone.

use crate::types::{AnalyticsId, MemberId};
use std::collections::HashMap;
use uuid::Uuid;

/// Length of an analytics id in hex characters (48 random bits).
pub const ANALYTICS_ID_LEN: usize = 12;

/// A fresh random analytics id: the first 12 hex digits of a v4 UUID.
pub fn fresh_analytics_id() -> AnalyticsId {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(ANALYTICS_ID_LEN);
    hex
}

/// Bijection between source member ids and analytics ids for one run.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    forward: HashMap<MemberId, AnalyticsId>,
    reverse: HashMap<AnalyticsId, MemberId>,
    collisions: usize,
}

impl IdentityMap {
    /// Build a map with random v4-derived tokens.
    pub fn generate(member_ids: &[MemberId]) -> Self {
        Self::generate_with(member_ids, fresh_analytics_id)
    }

    /// Build a map drawing tokens from `next_token`.
    ///
    /// A token already handed to another member is discarded and a new one
    /// drawn; only the colliding member is affected. Repeated member ids
    /// keep their first token.
    pub fn generate_with<F>(member_ids: &[MemberId], mut next_token: F) -> Self
    where
        F: FnMut() -> AnalyticsId,
    {
        let mut map = Self {
            forward: HashMap::with_capacity(member_ids.len()),
            reverse: HashMap::with_capacity(member_ids.len()),
            collisions: 0,
        };

        for &member_id in member_ids {
            if map.forward.contains_key(&member_id) {
                continue;
            }
            let mut token = next_token();
            while map.reverse.contains_key(&token) {
                map.collisions += 1;
                log::warn!("identity: analytics id collision, regenerating for one member");
                token = next_token();
            }
            map.reverse.insert(token.clone(), member_id);
            map.forward.insert(member_id, token);
        }
        map
    }

    pub fn analytics_id(&self, member_id: MemberId) -> Option<&str> {
        self.forward.get(&member_id).map(String::as_str)
    }

    /// Reverse lookup. Only the link store and tests have a use for this.
    pub fn member_id(&self, analytics_id: &str) -> Option<MemberId> {
        self.reverse.get(analytics_id).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of tokens discarded because they were already taken.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn iter(&self) -> impl Iterator<Item = (MemberId, &str)> + '_ {
        self.forward.iter().map(|(m, a)| (*m, a.as_str()))
    }
}
