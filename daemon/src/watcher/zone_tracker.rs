//! Entity/zone state machine for Power.log.
//!
//! Power.log describes the game as a stream of low-level updates. An
//! entity's card id and its zone usually arrive on different lines, and the
//! numeric entity id is the only key that ties them together. This module
//! rebuilds the fact "card X left/entered the tracked zone" from that stream.
//!
//! Recognized lines:
//! - `TAG_CHANGE Entity=<token> tag=<TAG> value=<VALUE>`: a field change.
//! - `FULL_ENTITY`/`SHOW_ENTITY`/`CHANGE_ENTITY` headers: introduce or
//!   re-describe an entity, possibly with its card id and an inline zone.
//! - indented `tag=<TAG> value=<VALUE>` lines following a header: the
//!   header entity's current fields.
//!
//! A zone change whose card id is not known yet is parked and reported the
//! moment a header reveals the card id.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ZoneConfig;

static TAG_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TAG_CHANGE Entity=(?P<entity>.+?) tag=(?P<tag>\S+) value=(?P<value>\S+)")
        .expect("valid TAG_CHANGE regex")
});

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:FULL_ENTITY|SHOW_ENTITY|CHANGE_ENTITY) - \w+ (?P<rest>.*)$")
        .expect("valid header regex")
});

static NESTED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)tag=(?P<tag>\S+) value=(?P<value>\S*)\s*$").expect("valid nested regex")
});

/// `ID=64` as printed by `FULL_ENTITY - Creating`.
static HEADER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bID=(?P<id>\d+)").expect("valid ID regex"));

static HEADER_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Entity=(?P<entity>.+?) CardID=").expect("valid header entity regex")
});

static CARD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CardID=(?P<card>\w*)").expect("valid CardID regex"));

/// `id=64` inside a bracket token.
static BRACKET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bid=(?P<id>\d+)").expect("valid id regex"));

/// `zone=DECK` inside a bracket token (`zonePos=` does not match).
static BRACKET_ZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bzone=(?P<zone>\w+)").expect("valid zone regex"));

/// Direction of a tracked-zone transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTransition {
    /// Moved into the tracked zone.
    Added,
    /// Moved out of the tracked zone.
    Removed,
}

/// A resolved transition for an entity with a known card id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneEvent {
    pub transition: ZoneTransition,
    pub card_id: String,
    pub entity_id: u32,
}

/// What is known about one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: u32,
    /// Controlling player; `None` until a controller tag is seen.
    pub controller: Option<u32>,
    /// Card id; `None` until a header reveals it.
    pub card_id: Option<String>,
    /// Last known zone.
    pub zone: Option<String>,
    /// Whether `zone` is the tracked zone.
    pub in_tracked_zone: bool,
}

impl EntityRecord {
    fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Stateful parser turning Power.log lines into [`ZoneEvent`]s.
#[derive(Debug)]
pub struct ZoneTracker {
    config: ZoneConfig,
    entities: HashMap<u32, EntityRecord>,
    pending_removed: HashSet<u32>,
    pending_added: HashSet<u32>,
    /// Entity introduced by the most recent header, for nested tag lines.
    header_entity: Option<u32>,
}

impl ZoneTracker {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
            pending_removed: HashSet::new(),
            pending_added: HashSet::new(),
            header_entity: None,
        }
    }

    /// Drop all entity state and pending transitions. Emits nothing.
    pub fn reset(&mut self) {
        debug!(
            entities = self.entities.len(),
            pending = self.pending_removed.len() + self.pending_added.len(),
            "Resetting zone tracker"
        );
        self.entities.clear();
        self.pending_removed.clear();
        self.pending_added.clear();
        self.header_entity = None;
    }

    pub fn entity(&self, id: u32) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Number of transitions still waiting for a card id.
    pub fn pending_count(&self) -> usize {
        self.pending_removed.len() + self.pending_added.len()
    }

    /// Feed one raw Power.log line, returning the events it resolves.
    pub fn feed_line(&mut self, line: &str) -> Vec<ZoneEvent> {
        let mut events = Vec::new();

        if let Some(caps) = TAG_CHANGE.captures(line) {
            self.header_entity = None;
            let token = &caps["entity"];
            if let Some(id) = parse_entity_token(token) {
                // The bracket shows the zone before this change.
                if caps["tag"] == self.config.zone_tag {
                    if let Some(zone) = BRACKET_ZONE.captures(token) {
                        self.seed_zone(id, &zone["zone"]);
                    }
                }
                self.apply_tag_change(id, &caps["tag"], &caps["value"], &mut events);
            }
            return events;
        }

        if let Some(caps) = HEADER.captures(line) {
            self.apply_header(&caps["rest"], &mut events);
            return events;
        }

        if let Some(caps) = NESTED_TAG.captures(line) {
            if let Some(id) = self.header_entity {
                self.apply_nested_tag(id, &caps["tag"], &caps["value"]);
            }
            return events;
        }

        // Anything else closes the header block.
        self.header_entity = None;
        events
    }

    fn apply_tag_change(&mut self, id: u32, tag: &str, value: &str, events: &mut Vec<ZoneEvent>) {
        if tag == self.config.controller_tag {
            if let Ok(controller) = value.parse::<u32>() {
                self.record_mut(id).controller = Some(controller);
            }
            return;
        }

        if tag != self.config.zone_tag {
            return;
        }

        let tracked = self.config.tracked_zone.as_str();
        let record = self
            .entities
            .entry(id)
            .or_insert_with(|| EntityRecord::new(id));
        let previous = record.zone.replace(value.to_string());
        record.in_tracked_zone = value == tracked;

        // A first value cannot be a transition.
        let Some(previous) = previous else {
            trace!(entity = id, zone = value, "First zone value");
            return;
        };
        if previous == value {
            return;
        }

        let transition = if previous == tracked {
            ZoneTransition::Removed
        } else if value == tracked {
            ZoneTransition::Added
        } else {
            return;
        };

        debug!(entity = id, from = %previous, to = value, ?transition, "Tracked zone transition");
        self.raise(id, transition, events);
    }

    fn apply_header(&mut self, rest: &str, events: &mut Vec<ZoneEvent>) {
        let Some((id, token)) = header_entity(rest) else {
            self.header_entity = None;
            return;
        };
        self.header_entity = Some(id);

        let inline_zone = BRACKET_ZONE
            .captures(token)
            .map(|caps| caps["zone"].to_string());
        if let Some(zone) = inline_zone {
            self.seed_zone(id, &zone);
        } else {
            self.record_mut(id);
        }

        let card_id = CARD_ID
            .captures_iter(rest)
            .last()
            .map(|caps| caps["card"].to_string())
            .filter(|card| !card.is_empty());
        if let Some(card_id) = card_id {
            self.discover_card_id(id, card_id, events);
        }
    }

    fn apply_nested_tag(&mut self, id: u32, tag: &str, value: &str) {
        if tag == self.config.zone_tag {
            self.seed_zone(id, value);
        } else if tag == self.config.controller_tag {
            if let Ok(controller) = value.parse::<u32>() {
                self.record_mut(id).controller = Some(controller);
            }
        }
    }

    /// Record a zone snapshot without treating it as a change.
    fn seed_zone(&mut self, id: u32, zone: &str) {
        let tracked = self.config.tracked_zone.as_str();
        let record = self
            .entities
            .entry(id)
            .or_insert_with(|| EntityRecord::new(id));
        if record.zone.is_none() && !zone.is_empty() {
            record.zone = Some(zone.to_string());
            record.in_tracked_zone = zone == tracked;
        }
    }

    fn discover_card_id(&mut self, id: u32, card_id: String, events: &mut Vec<ZoneEvent>) {
        let record = self.record_mut(id);
        if record.card_id.as_deref() != Some(card_id.as_str()) {
            trace!(entity = id, card = %card_id, "Card id known");
            record.card_id = Some(card_id.clone());
        }

        let removed = self.pending_removed.remove(&id);
        let added = self.pending_added.remove(&id);
        if !(removed || added) {
            return;
        }

        let allowed = self.controller_allows(id);
        for (pending, transition) in [
            (removed, ZoneTransition::Removed),
            (added, ZoneTransition::Added),
        ] {
            if !pending {
                continue;
            }
            if allowed {
                debug!(entity = id, card = %card_id, ?transition, "Resolved deferred transition");
                events.push(ZoneEvent {
                    transition,
                    card_id: card_id.clone(),
                    entity_id: id,
                });
            } else {
                debug!(entity = id, ?transition, "Deferred transition dropped by controller filter");
            }
        }
    }

    fn raise(&mut self, id: u32, transition: ZoneTransition, events: &mut Vec<ZoneEvent>) {
        if !self.controller_allows(id) {
            debug!(entity = id, ?transition, "Not controlled by tracked player");
            return;
        }

        let card_id = self.entities.get(&id).and_then(|r| r.card_id.clone());
        match card_id {
            Some(card_id) => events.push(ZoneEvent {
                transition,
                card_id,
                entity_id: id,
            }),
            None => {
                debug!(entity = id, ?transition, "Card id unknown, deferring");
                match transition {
                    ZoneTransition::Removed => self.pending_removed.insert(id),
                    ZoneTransition::Added => self.pending_added.insert(id),
                };
            }
        }
    }

    /// With a configured controller, only entities known to belong to it pass.
    fn controller_allows(&self, id: u32) -> bool {
        match self.config.controller_id {
            None => true,
            Some(mine) => self
                .entities
                .get(&id)
                .and_then(|r| r.controller)
                .is_some_and(|controller| controller == mine),
        }
    }

    fn record_mut(&mut self, id: u32) -> &mut EntityRecord {
        self.entities
            .entry(id)
            .or_insert_with(|| EntityRecord::new(id))
    }
}

/// Entity id from a `TAG_CHANGE` entity token: a bare number or a bracket
/// with `id=NN`. Named entities (`GameEntity`, player names) yield `None`.
fn parse_entity_token(token: &str) -> Option<u32> {
    let token = token.trim();
    if let Ok(id) = token.parse() {
        return Some(id);
    }
    if !token.starts_with('[') {
        return None;
    }
    BRACKET_ID.captures(token)?["id"].parse().ok()
}

/// Entity id of a header plus the token its inline snapshot is read from.
fn header_entity(rest: &str) -> Option<(u32, &str)> {
    if let Some(caps) = HEADER_ID.captures(rest) {
        let id = caps["id"].parse().ok()?;
        return Some((id, rest));
    }

    if let Some(m) = HEADER_ENTITY.captures(rest).and_then(|c| c.name("entity")) {
        let token = m.as_str();
        return parse_entity_token(token).map(|id| (id, token));
    }

    // `FULL_ENTITY - Updating [.. id=7 ..] CardID=`
    let start = rest.find('[')?;
    let end = rest.rfind(']')?;
    let token = rest.get(start..=end)?;
    parse_entity_token(token).map(|id| (id, token))
}
