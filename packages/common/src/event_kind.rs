use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five event families ingested from a report.
///
/// Each kind maps to one provider `dataType` and one storage table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Cast,
    Buff,
    Damage,
    Heal,
    Death,
}

impl EventKind {
    /// All kinds, in the order they are fetched for a fight.
    pub const ALL: &'static [EventKind] = &[
        Self::Cast,
        Self::Buff,
        Self::Damage,
        Self::Heal,
        Self::Death,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Buff => "buff",
            Self::Damage => "damage",
            Self::Heal => "heal",
            Self::Death => "death",
        }
    }

    /// The provider's `EventDataType` enum value for this kind.
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::Cast => "Casts",
            Self::Buff => "Buffs",
            Self::Damage => "DamageDone",
            Self::Heal => "Healing",
            Self::Death => "Deaths",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventKindError {
    invalid: String,
}

impl fmt::Display for ParseEventKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid event kind '{}'. Valid values: {}",
            self.invalid,
            EventKind::ALL
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseEventKindError {}

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cast" | "casts" => Ok(Self::Cast),
            "buff" | "buffs" => Ok(Self::Buff),
            "damage" => Ok(Self::Damage),
            "heal" | "healing" => Ok(Self::Heal),
            "death" | "deaths" => Ok(Self::Death),
            _ => Err(ParseEventKindError {
                invalid: s.to_string(),
            }),
        }
    }
}

/// Parse a comma-separated kind filter such as `"damage,heal"`.
///
/// Empty segments are ignored and duplicates collapse; an empty input yields an empty list.
pub fn parse_kind_list(input: &str) -> Result<Vec<EventKind>, ParseEventKindError> {
    let mut kinds = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind: EventKind = part.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&EventKind::Damage).unwrap(), "\"damage\"");
        let parsed: EventKind = serde_json::from_str("\"heal\"").unwrap();
        assert_eq!(parsed, EventKind::Heal);
    }

    #[test]
    fn test_from_str_accepts_plural_and_case() {
        assert_eq!("Casts".parse::<EventKind>().unwrap(), EventKind::Cast);
        assert_eq!(" DEATH ".parse::<EventKind>().unwrap(), EventKind::Death);
        assert_eq!("healing".parse::<EventKind>().unwrap(), EventKind::Heal);
        assert!("summon".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_parse_kind_list_dedupes() {
        let kinds = parse_kind_list("damage, heal,,damage").unwrap();
        assert_eq!(kinds, vec![EventKind::Damage, EventKind::Heal]);
        assert!(parse_kind_list("").unwrap().is_empty());
        assert!(parse_kind_list("damage,bogus").is_err());
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(EventKind::Heal.data_type(), "Healing");
        assert_eq!(EventKind::Damage.data_type(), "DamageDone");
    }
}
