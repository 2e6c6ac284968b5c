//! Raw provider events to typed records.
//!
//! Normalization is pure: every input maps to a canonical event, a skip with a
//! reason, or a malformed-event error. None of these abort the surrounding batch.

use std::collections::HashMap;

use common::EventKind;
use serde_json::Value;
use thiserror::Error;
use wcl::{ActorMeta, RawEvent};

/// A resolved actor reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRef {
    /// Internal row id of a player in the current report.
    Player { player_id: i32 },
    /// Anything else: provider actor id and display name, kept verbatim.
    Npc { actor_id: i32, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    /// Milliseconds from report start.
    pub timestamp: i64,
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Cast(CastEvent),
    Buff(BuffEvent),
    Damage(DamageEvent),
    Heal(HealEvent),
    Death(DeathEvent),
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Cast(_) => EventKind::Cast,
            Self::Buff(_) => EventKind::Buff,
            Self::Damage(_) => EventKind::Damage,
            Self::Heal(_) => EventKind::Heal,
            Self::Death(_) => EventKind::Death,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastEvent {
    pub ability_id: i32,
    pub source: ActorRef,
    pub target: Option<ActorRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuffEvent {
    pub ability_id: i32,
    pub subtype: String,
    pub stacks: Option<i32>,
    pub source: Option<ActorRef>,
    pub target: ActorRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DamageEvent {
    pub ability_id: i32,
    pub source: ActorRef,
    pub target: Option<ActorRef>,
    pub hit_type: i32,
    pub amount: i64,
    pub absorbed: i64,
    pub overkill: i64,
    pub mitigated: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealEvent {
    pub ability_id: i32,
    pub source: ActorRef,
    pub target: Option<ActorRef>,
    pub hit_type: i32,
    pub amount: i64,
    pub overheal: i64,
    pub absorbed: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeathEvent {
    pub target: ActorRef,
    pub killer: Option<ActorRef>,
    pub ability_id: Option<i32>,
}

/// Why a well-formed event was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A subtype this kind does not store, such as `begincast` or `absorbed`.
    UnexpectedType(String),
    /// The event names a different fight than the one being walked.
    ForeignFight(i64),
    UnresolvedSource,
    UnresolvedTarget,
}

impl SkipReason {
    /// Stable key used when aggregating skip counts.
    pub fn key(&self) -> &'static str {
        match self {
            Self::UnexpectedType(_) => "unexpected_type",
            Self::ForeignFight(_) => "foreign_fight",
            Self::UnresolvedSource => "unresolved_source",
            Self::UnresolvedTarget => "unresolved_target",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Event(CanonicalEvent),
    Skip(SkipReason),
}

/// A single event failed mandatory-field validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("{kind} event is missing mandatory field '{field}'")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },
    #[error("{kind} event has invalid '{field}': {value}")]
    InvalidField {
        kind: EventKind,
        field: &'static str,
        value: String,
    },
}

/// Actors known for the report being ingested.
#[derive(Debug, Clone, Default)]
pub struct ActorDirectory {
    /// Provider actor id to internal player row id.
    players: HashMap<i32, i32>,
    /// Provider actor id to display name, for NPCs and pets.
    npc_names: HashMap<i32, String>,
}

impl ActorDirectory {
    pub fn new(players: HashMap<i32, i32>, roster: &[ActorMeta]) -> Self {
        let npc_names = roster
            .iter()
            .filter(|a| !a.is_player())
            .map(|a| (a.id, a.name.clone()))
            .collect();
        Self { players, npc_names }
    }

    fn resolve(&self, id: Option<i64>, inline_name: Option<&str>) -> Option<ActorRef> {
        let id = i32::try_from(id?).ok().filter(|id| *id >= 0)?;
        if let Some(&player_id) = self.players.get(&id) {
            return Some(ActorRef::Player { player_id });
        }
        let name = inline_name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| self.npc_names.get(&id).cloned())?;
        Some(ActorRef::Npc { actor_id: id, name })
    }
}

/// Per-fight inputs shared by every event of the walk.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Provider fight id being walked.
    pub fight_id: i32,
    pub actors: &'a ActorDirectory,
}

const BUFF_SUBTYPES: &[&str] = &[
    "applybuff",
    "removebuff",
    "refreshbuff",
    "applybuffstack",
    "removebuffstack",
    "applydebuff",
    "removedebuff",
    "refreshdebuff",
    "applydebuffstack",
    "removedebuffstack",
];

fn accepts(kind: EventKind, subtype: &str) -> bool {
    match kind {
        EventKind::Cast => subtype == "cast",
        EventKind::Buff => BUFF_SUBTYPES.contains(&subtype),
        EventKind::Damage => subtype == "damage",
        EventKind::Heal => subtype == "heal",
        EventKind::Death => subtype == "death",
    }
}

/// Typed view over one raw event object.
struct Fields<'a> {
    raw: &'a serde_json::Map<String, Value>,
    kind: EventKind,
}

impl<'a> Fields<'a> {
    fn int(&self, field: &'static str) -> Result<Option<i64>, NormalizeError> {
        match self.raw.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(Some)
                .ok_or_else(|| self.invalid(field, n.to_string())),
            Some(other) => Err(self.invalid(field, other.to_string())),
        }
    }

    fn required_int(&self, field: &'static str) -> Result<i64, NormalizeError> {
        self.int(field)?.ok_or(NormalizeError::MissingField {
            kind: self.kind,
            field,
        })
    }

    fn id(&self, field: &'static str) -> Result<Option<i32>, NormalizeError> {
        self.int(field)?
            .map(|v| i32::try_from(v).map_err(|_| self.invalid(field, v.to_string())))
            .transpose()
    }

    fn required_id(&self, field: &'static str) -> Result<i32, NormalizeError> {
        self.id(field)?.ok_or(NormalizeError::MissingField {
            kind: self.kind,
            field,
        })
    }

    fn str(&self, field: &str) -> Option<&'a str> {
        self.raw.get(field).and_then(Value::as_str)
    }

    /// Name from an inline actor object (`"source": {"name": ..}`), present when
    /// the provider did not collapse actors to ids.
    fn inline_name(&self, field: &str) -> Option<&'a str> {
        self.raw
            .get(field)
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
    }

    fn invalid(&self, field: &'static str, value: String) -> NormalizeError {
        NormalizeError::InvalidField {
            kind: self.kind,
            field,
            value,
        }
    }
}

/// Maps one raw event of the given kind into its canonical form.
pub fn normalize(
    raw: &RawEvent,
    kind: EventKind,
    ctx: NormalizeContext<'_>,
) -> Result<Normalized, NormalizeError> {
    let Some(object) = raw.as_object() else {
        return Err(NormalizeError::InvalidField {
            kind,
            field: "event",
            value: raw.to_string(),
        });
    };
    let f = Fields { raw: object, kind };

    let subtype = f.str("type").ok_or(NormalizeError::MissingField {
        kind,
        field: "type",
    })?;
    if !accepts(kind, subtype) {
        return Ok(Normalized::Skip(SkipReason::UnexpectedType(subtype.into())));
    }
    let timestamp = f.required_int("timestamp")?;
    if let Some(fight) = f.int("fight")?
        && fight != i64::from(ctx.fight_id)
    {
        return Ok(Normalized::Skip(SkipReason::ForeignFight(fight)));
    }

    let source = ctx
        .actors
        .resolve(f.int("sourceID")?, f.inline_name("source"));
    let target = ctx
        .actors
        .resolve(f.int("targetID")?, f.inline_name("target"));

    let body = match kind {
        EventKind::Cast => {
            let ability_id = f.required_id("abilityGameID")?;
            let Some(source) = source else {
                return Ok(Normalized::Skip(SkipReason::UnresolvedSource));
            };
            EventBody::Cast(CastEvent {
                ability_id,
                source,
                target,
            })
        }
        EventKind::Buff => {
            let ability_id = f.required_id("abilityGameID")?;
            let stacks = f.id("stack")?;
            let Some(target) = target else {
                return Ok(Normalized::Skip(SkipReason::UnresolvedTarget));
            };
            EventBody::Buff(BuffEvent {
                ability_id,
                subtype: subtype.to_string(),
                stacks,
                source,
                target,
            })
        }
        EventKind::Damage => {
            let ability_id = f.required_id("abilityGameID")?;
            let amount = f.required_int("amount")?;
            let Some(source) = source else {
                return Ok(Normalized::Skip(SkipReason::UnresolvedSource));
            };
            EventBody::Damage(DamageEvent {
                ability_id,
                source,
                target,
                hit_type: f.id("hitType")?.unwrap_or(0),
                amount,
                absorbed: f.int("absorbed")?.unwrap_or(0),
                overkill: f.int("overkill")?.unwrap_or(0),
                mitigated: f.int("mitigated")?.unwrap_or(0),
            })
        }
        EventKind::Heal => {
            let ability_id = f.required_id("abilityGameID")?;
            let amount = f.required_int("amount")?;
            let Some(source) = source else {
                return Ok(Normalized::Skip(SkipReason::UnresolvedSource));
            };
            EventBody::Heal(HealEvent {
                ability_id,
                source,
                target,
                hit_type: f.id("hitType")?.unwrap_or(0),
                amount,
                overheal: f.int("overheal")?.unwrap_or(0),
                absorbed: f.int("absorbed")?.unwrap_or(0),
            })
        }
        EventKind::Death => {
            let ability_id = match f.id("killingAbilityGameID")? {
                Some(id) => Some(id),
                None => f.id("abilityGameID")?,
            };
            let killer = ctx
                .actors
                .resolve(f.int("killerID")?, f.inline_name("killer"));
            let Some(target) = target else {
                return Ok(Normalized::Skip(SkipReason::UnresolvedTarget));
            };
            EventBody::Death(DeathEvent {
                target,
                killer,
                ability_id,
            })
        }
    };

    Ok(Normalized::Event(CanonicalEvent { timestamp, body }))
}
