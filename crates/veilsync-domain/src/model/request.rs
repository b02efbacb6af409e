//! Outgoing sync request types.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::snapshot::EntityKind;

/// A group, channel, bot or sticker set observed by the host.
///
/// Identity is the `id` alone; the descriptive fields travel to the server
/// but never affect equality or set membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_megagroup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl TrackedEntity {
    /// Creates an entity with only an id.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: String::new(),
            user_name: String::new(),
            is_megagroup: None,
            is_public: None,
        }
    }

    /// Sets the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the public username.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    /// Marks the entity as a megagroup (or not).
    pub fn with_megagroup(mut self, is_megagroup: bool) -> Self {
        self.is_megagroup = Some(is_megagroup);
        self
    }

    /// Marks the entity as public (or not).
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }
}

impl PartialEq for TrackedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TrackedEntity {}

/// Append-only set of entities keyed by id.
///
/// Equality is set equality over ids; order of insertion is irrelevant.
/// Serialized as a JSON array.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entries: BTreeMap<i64, TrackedEntity>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entity` if its id is not yet tracked. Returns true if added.
    pub fn insert(&mut self, entity: TrackedEntity) -> bool {
        use std::collections::btree_map::Entry;

        match self.entries.entry(entity.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    /// Inserts every entity of `other` not yet tracked. Returns the count added.
    pub fn merge(&mut self, other: &EntitySet) -> usize {
        other
            .iter()
            .filter(|entity| self.insert((*entity).clone()))
            .count()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }
}

impl PartialEq for EntitySet {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.keys().eq(other.entries.keys())
    }
}

impl Eq for EntitySet {}

impl FromIterator<TrackedEntity> for EntitySet {
    fn from_iter<I: IntoIterator<Item = TrackedEntity>>(iter: I) -> Self {
        let mut set = EntitySet::new();
        for entity in iter {
            set.insert(entity);
        }
        set
    }
}

impl Serialize for EntitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de> Deserialize<'de> for EntitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entities = Option::<Vec<TrackedEntity>>::deserialize(deserializer)?;
        Ok(entities.unwrap_or_default().into_iter().collect())
    }
}

/// The four cumulative entity sets carried by a sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntities {
    #[serde(default)]
    pub groups: EntitySet,
    #[serde(default)]
    pub channels: EntitySet,
    #[serde(default)]
    pub bots: EntitySet,
    #[serde(default)]
    pub stickers: EntitySet,
}

impl TrackedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: EntityKind) -> &EntitySet {
        match kind {
            EntityKind::Group => &self.groups,
            EntityKind::Channel => &self.channels,
            EntityKind::Bot => &self.bots,
            EntityKind::Sticker => &self.stickers,
        }
    }

    pub fn set_mut(&mut self, kind: EntityKind) -> &mut EntitySet {
        match kind {
            EntityKind::Group => &mut self.groups,
            EntityKind::Channel => &mut self.channels,
            EntityKind::Bot => &mut self.bots,
            EntityKind::Sticker => &mut self.stickers,
        }
    }

    /// Adds one entity. Returns true if it was not tracked yet.
    pub fn insert(&mut self, kind: EntityKind, entity: TrackedEntity) -> bool {
        self.set_mut(kind).insert(entity)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, kind: EntityKind, entity: TrackedEntity) -> Self {
        self.insert(kind, entity);
        self
    }

    pub fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.set(kind).contains(id)
    }

    /// Unions `other` into `self`. Returns the number of newly tracked entities.
    pub fn merge(&mut self, other: &TrackedEntities) -> usize {
        EntityKind::ALL
            .iter()
            .map(|kind| self.set_mut(*kind).merge(other.set(*kind)))
            .sum()
    }

    /// Total number of tracked entities across all kinds.
    pub fn len(&self) -> usize {
        EntityKind::ALL.iter().map(|kind| self.set(*kind).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The user on whose behalf requests are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub user_id: i64,
    #[serde(default, rename = "user_phone")]
    pub phone: String,
    #[serde(default)]
    pub user_name: String,
}

impl RequesterIdentity {
    pub fn new(user_id: i64, phone: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            phone: phone.into(),
            user_name: user_name.into(),
        }
    }
}

/// Client metadata attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_os_type: String,
    pub client_session_id: String,
    pub client_version_code: String,
    pub client_version_name: String,
}

/// A sync request under construction or in flight.
///
/// Two requests are equal iff the requester identity and all four entity
/// sets match; client metadata is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    #[serde(flatten)]
    pub identity: RequesterIdentity,
    #[serde(flatten)]
    pub entities: TrackedEntities,
    #[serde(flatten)]
    pub client: ClientInfo,
}

impl PendingRequest {
    pub fn new(identity: RequesterIdentity, entities: TrackedEntities, client: ClientInfo) -> Self {
        Self {
            identity,
            entities,
            client,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.identity.user_id
    }
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.entities == other.entities
    }
}

impl Eq for PendingRequest {}
