//! Policy snapshot types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Per-entity allow/deny decisions keyed by the decimal form of the id.
///
/// Absence of a key means "the server has not spoken", which is not the
/// same as an explicit `false`.
pub type AccessMap = BTreeMap<String, bool>;

/// Kind of entity the policy service renders decisions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Group,
    Channel,
    Bot,
    Sticker,
}

impl EntityKind {
    /// All entity kinds, in wire order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Group,
        EntityKind::Channel,
        EntityKind::Bot,
        EntityKind::Sticker,
    ];

    /// Field name used on the wire for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Group => "groups",
            EntityKind::Channel => "channels",
            EntityKind::Bot => "bots",
            EntityKind::Sticker => "stickers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization the current user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the user must re-authorize with a different organization.
    #[serde(
        default,
        rename = "need_change",
        skip_serializing_if = "Option::is_none"
    )]
    pub needs_reauthorization: Option<bool>,
}

/// The four entity access mappings plus `users`, reserved for future use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTable {
    #[serde(default, deserialize_with = "deserialize_access_map")]
    pub groups: AccessMap,
    #[serde(default, deserialize_with = "deserialize_access_map")]
    pub channels: AccessMap,
    #[serde(default, deserialize_with = "deserialize_access_map")]
    pub bots: AccessMap,
    #[serde(default, deserialize_with = "deserialize_access_map")]
    pub stickers: AccessMap,
    #[serde(default, deserialize_with = "deserialize_access_map")]
    pub users: AccessMap,
}

impl AccessTable {
    /// Returns the mapping for `kind`.
    pub fn map(&self, kind: EntityKind) -> &AccessMap {
        match kind {
            EntityKind::Group => &self.groups,
            EntityKind::Channel => &self.channels,
            EntityKind::Bot => &self.bots,
            EntityKind::Sticker => &self.stickers,
        }
    }

    /// Returns the mapping for `kind` mutably.
    pub fn map_mut(&mut self, kind: EntityKind) -> &mut AccessMap {
        match kind {
            EntityKind::Group => &mut self.groups,
            EntityKind::Channel => &mut self.channels,
            EntityKind::Bot => &mut self.bots,
            EntityKind::Sticker => &mut self.stickers,
        }
    }

    /// Looks up the explicit decision for `id`.
    pub fn decision(&self, kind: EntityKind, id: i64) -> Option<bool> {
        self.map(kind).get(&id.to_string()).copied()
    }

    /// Returns true if the server has rendered any decision for `id`.
    pub fn has_decision(&self, kind: EntityKind, id: i64) -> bool {
        self.map(kind).contains_key(&id.to_string())
    }

    /// Copies every decision from `previous` whose key is absent here.
    ///
    /// Keys present in both keep this table's value. Returns the number of
    /// carried-forward decisions.
    pub fn backfill_from(&mut self, previous: &AccessTable) -> usize {
        let mut carried = 0;
        for kind in EntityKind::ALL {
            carried += backfill_map(self.map_mut(kind), previous.map(kind));
        }
        carried += backfill_map(&mut self.users, &previous.users);
        carried
    }
}

fn backfill_map(current: &mut AccessMap, previous: &AccessMap) -> usize {
    let mut carried = 0;
    for (key, allowed) in previous {
        if !current.contains_key(key) {
            current.insert(key.clone(), *allowed);
            carried += 1;
        }
    }
    carried
}

/// The cached policy document.
///
/// Every scalar is optional on the wire; the accessors on
/// [`AccessEvaluator`](crate::evaluator::AccessEvaluator) apply the
/// documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,

    #[serde(default, deserialize_with = "deserialize_access_table")]
    pub access: AccessTable,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_chat: Option<bool>,
    /// Raw minimum length; `-1` or absent means "not specified".
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret_chat_minimum_length: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_bio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_bio_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_profile_photo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_profile_photo_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_profile_video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_profile_video_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_stories: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_sticker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_stickers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_emoji_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manage_users: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_toggle_voice_video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_required: Option<bool>,

    /// Image shown in place of blocked content.
    #[serde(
        default,
        rename = "disable_stickers_image",
        skip_serializing_if = "Option::is_none"
    )]
    pub blocked_image_url: Option<String>,

    /// Raw photo limit; negative means unlimited, zero is treated as one.
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_photo_limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_account_url: Option<String>,
}

impl PolicySnapshot {
    /// Organization id, if the snapshot carries one.
    pub fn organization_id(&self) -> Option<i64> {
        self.organization.as_ref().and_then(|org| org.id)
    }

    /// Effective profile photo limit.
    ///
    /// Absent or negative values are unlimited (`i64::MAX`), zero becomes 1.
    pub fn effective_profile_photo_limit(&self) -> i64 {
        let raw = self
            .profile_photo_limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(-1);
        match raw {
            v if v < 0 => i64::MAX,
            0 => 1,
            v => v,
        }
    }

    /// Effective secret chat minimum length; `-1` when not specified.
    pub fn effective_secret_chat_minimum_length(&self) -> i64 {
        self.secret_chat_minimum_length
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(-1)
    }

    /// True if either global sticker flag is set.
    pub fn stickers_disabled(&self) -> bool {
        self.disable_sticker.unwrap_or(false) || self.disable_stickers.unwrap_or(false)
    }
}

/// An explicit `null` table reads as empty.
fn deserialize_access_table<'de, D>(deserializer: D) -> Result<AccessTable, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<AccessTable>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a JSON object, an array of objects (first occurrence of a key
/// wins), or null. Entries whose value is not a boolean are dropped.
fn deserialize_access_map<'de, D>(deserializer: D) -> Result<AccessMap, D::Error>
where
    D: Deserializer<'de>,
{
    let mut folded = AccessMap::new();
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Object(entries)) => fold_entries(&mut folded, entries),
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                if let serde_json::Value::Object(entries) = item {
                    fold_entries(&mut folded, entries);
                }
            }
        }
        _ => {}
    }
    Ok(folded)
}

fn fold_entries(folded: &mut AccessMap, entries: serde_json::Map<String, serde_json::Value>) {
    for (key, value) in entries {
        if let serde_json::Value::Bool(allowed) = value {
            folded.entry(key).or_insert(allowed);
        }
    }
}

/// Numeric fields arrive as strings from the service; numbers are accepted
/// too. Anything else reads as absent.
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
