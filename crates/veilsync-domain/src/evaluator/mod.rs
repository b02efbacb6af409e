//! Access evaluation over the cached policy snapshot.
//!
//! All queries are pure reads of [`PolicyCache::read`]; none of them wait
//! for an in-flight sync.
//!
//! # Default policy
//!
//! | Query                          | Unknown id / no snapshot        |
//! |--------------------------------|---------------------------------|
//! | group, channel, bot            | allowed (fail-open)             |
//! | sticker                        | denied if stickers are disabled, otherwise allowed |
//! | conversation                   | `None`, caller decides          |
//! | conversation checked on server | `true` when no snapshot exists  |
//!
//! The support bot is always allowed. [`StaticPolicySettings::disable_bots`]
//! denies every other bot without consulting the snapshot.

use std::sync::Arc;

use crate::cache::PolicyCache;
use crate::model::{EntityKind, PolicySnapshot};

/// Id of the support bot, reachable under every policy.
pub const SUPPORT_BOT_ID: i64 = 689_684_671;

/// Policy switches compiled into the host rather than served remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPolicySettings {
    pub disable_global_search: bool,
    pub disable_youtube_video_embedding: bool,
    pub disable_in_app_browser: bool,
    pub disable_auto_play_gifs: bool,
    pub disable_payments: bool,
    pub disable_bots: bool,
    pub disable_inline_bots: bool,
    pub disable_gifs: bool,
}

impl Default for StaticPolicySettings {
    fn default() -> Self {
        Self {
            disable_global_search: true,
            disable_youtube_video_embedding: true,
            disable_in_app_browser: true,
            disable_auto_play_gifs: true,
            disable_payments: true,
            disable_bots: false,
            disable_inline_bots: true,
            disable_gifs: true,
        }
    }
}

impl StaticPolicySettings {
    /// Sets the global bot switch.
    pub fn with_disable_bots(mut self, disable_bots: bool) -> Self {
        self.disable_bots = disable_bots;
        self
    }
}

/// Answers availability questions against a [`PolicyCache`].
#[derive(Debug, Clone)]
pub struct AccessEvaluator {
    cache: Arc<PolicyCache>,
    statics: StaticPolicySettings,
}

impl AccessEvaluator {
    /// Creates an evaluator with the shipped static settings.
    pub fn new(cache: Arc<PolicyCache>) -> Self {
        Self {
            cache,
            statics: StaticPolicySettings::default(),
        }
    }

    /// Replaces the static settings.
    pub fn with_static_settings(mut self, statics: StaticPolicySettings) -> Self {
        self.statics = statics;
        self
    }

    pub fn static_settings(&self) -> &StaticPolicySettings {
        &self.statics
    }

    fn snapshot(&self) -> Option<Arc<PolicySnapshot>> {
        self.cache.read()
    }

    /// The server's explicit decision for `id`, without any default.
    pub fn decision(&self, kind: EntityKind, id: i64) -> Option<bool> {
        self.snapshot()
            .and_then(|snapshot| snapshot.access.decision(kind, id))
    }

    /// Availability after the fixed rules, `None` if still undecided.
    pub fn availability(&self, kind: EntityKind, id: i64) -> Option<bool> {
        match kind {
            EntityKind::Group | EntityKind::Channel => self.decision(kind, id),
            EntityKind::Bot => {
                if id == SUPPORT_BOT_ID {
                    return Some(true);
                }
                if self.statics.disable_bots {
                    return Some(false);
                }
                self.decision(kind, id)
            }
            EntityKind::Sticker => {
                let snapshot = self.snapshot()?;
                if snapshot.stickers_disabled() {
                    return Some(false);
                }
                snapshot.access.decision(kind, id)
            }
        }
    }

    /// Availability with the fail-open default applied.
    pub fn is_available(&self, kind: EntityKind, id: i64) -> bool {
        self.availability(kind, id).unwrap_or(true)
    }

    pub fn is_group_available(&self, id: i64) -> bool {
        self.is_available(EntityKind::Group, id)
    }

    pub fn is_channel_available(&self, id: i64) -> bool {
        self.is_available(EntityKind::Channel, id)
    }

    pub fn is_bot_available(&self, id: i64) -> bool {
        self.is_available(EntityKind::Bot, id)
    }

    pub fn is_sticker_available(&self, id: i64) -> bool {
        self.is_available(EntityKind::Sticker, id)
    }

    /// Combined availability of a conversation.
    ///
    /// Conversation ids encode their kind by sign: bots are looked up under
    /// `+id`, channels and groups under `-id`. Any explicit `true` wins; if
    /// none of the three has an answer the result is `None`.
    pub fn is_conversation_available(&self, conversation_id: i64) -> Option<bool> {
        let peer_id = conversation_id.checked_neg();
        [
            self.availability(EntityKind::Bot, conversation_id),
            peer_id.and_then(|id| self.availability(EntityKind::Channel, id)),
            peer_id.and_then(|id| self.availability(EntityKind::Group, id)),
        ]
        .into_iter()
        .flatten()
        .reduce(|acc, allowed| acc || allowed)
    }

    /// Whether the server has ever rendered a verdict on this conversation.
    ///
    /// Before the first sync this reports `true` so the host is not blocked.
    pub fn is_conversation_checked_on_server(&self, conversation_id: i64, channel_id: i64) -> bool {
        let Some(snapshot) = self.snapshot() else {
            return true;
        };
        let access = &snapshot.access;
        access.has_decision(EntityKind::Group, channel_id)
            || access.has_decision(EntityKind::Channel, channel_id)
            || access.has_decision(EntityKind::Bot, conversation_id)
    }

    fn flag(&self, read: impl FnOnce(&PolicySnapshot) -> Option<bool>) -> bool {
        self.snapshot()
            .and_then(|snapshot| read(&snapshot))
            .unwrap_or(false)
    }

    pub fn needs_organization_change(&self) -> bool {
        self.flag(|s| s.organization.as_ref().and_then(|o| o.needs_reauthorization))
    }

    pub fn organization_id(&self) -> Option<i64> {
        self.snapshot().and_then(|s| s.organization_id())
    }

    pub fn disable_stories(&self) -> bool {
        self.flag(|s| s.disable_stories)
    }

    pub fn disable_stickers(&self) -> bool {
        self.snapshot().is_some_and(|s| s.stickers_disabled())
    }

    pub fn disable_bio(&self) -> bool {
        self.flag(|s| s.disable_bio)
    }

    pub fn disable_bio_change(&self) -> bool {
        self.flag(|s| s.disable_bio_change)
    }

    pub fn disable_profile_photo(&self) -> bool {
        self.flag(|s| s.disable_profile_photo)
    }

    pub fn disable_profile_photo_change(&self) -> bool {
        self.flag(|s| s.disable_profile_photo_change)
    }

    pub fn disable_profile_video(&self) -> bool {
        self.flag(|s| s.disable_profile_video)
    }

    pub fn disable_profile_video_change(&self) -> bool {
        self.flag(|s| s.disable_profile_video_change)
    }

    pub fn disable_emoji_status(&self) -> bool {
        self.flag(|s| s.disable_emoji_status)
    }

    pub fn is_secret_chat_available(&self) -> bool {
        self.flag(|s| s.secret_chat)
    }

    pub fn is_in_chat_video_recording_enabled(&self) -> bool {
        self.flag(|s| s.input_toggle_voice_video)
    }

    pub fn can_manage_users(&self) -> bool {
        self.flag(|s| s.manage_users)
    }

    pub fn update_required(&self) -> bool {
        self.flag(|s| s.update_required)
    }

    /// Effective photo limit; unlimited (`i64::MAX`) before the first sync.
    pub fn profile_photo_limit(&self) -> i64 {
        self.snapshot()
            .map(|s| s.effective_profile_photo_limit())
            .unwrap_or(i64::MAX)
    }

    /// Minimum secret chat length, `-1` when not specified.
    pub fn secret_chat_minimum_length(&self) -> i64 {
        self.snapshot()
            .map(|s| s.effective_secret_chat_minimum_length())
            .unwrap_or(-1)
    }

    pub fn blocked_image_url(&self) -> Option<String> {
        self.snapshot().and_then(|s| s.blocked_image_url.clone())
    }

    pub fn remove_account_url(&self) -> Option<String> {
        self.snapshot().and_then(|s| s.remove_account_url.clone())
    }
}
