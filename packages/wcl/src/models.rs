use serde::{Deserialize, Deserializer};

/// One event record exactly as the provider returned it.
pub type RawEvent = serde_json::Value;

/// The provider sends epoch and offset milliseconds as GraphQL `Float`.
fn millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i64)
}

fn opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|v| v.round() as i64))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub owner: Option<ReportOwner>,
    #[serde(deserialize_with = "millis")]
    pub start_time: i64,
    #[serde(deserialize_with = "millis")]
    pub end_time: i64,
    #[serde(default)]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub fights: Vec<FightMeta>,
    #[serde(default)]
    pub master_data: Option<MasterData>,
}

impl ReportMeta {
    /// All actors from the report's master data, empty when the provider omitted it.
    pub fn actors(&self) -> &[ActorMeta] {
        self.master_data
            .as_ref()
            .map(|m| m.actors.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportOwner {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: i32,
    pub name: String,
}

/// Fight summary. Times are offsets from the report start.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightMeta {
    pub id: i32,
    pub name: String,
    #[serde(deserialize_with = "millis")]
    pub start_time: i64,
    #[serde(deserialize_with = "millis")]
    pub end_time: i64,
    #[serde(default)]
    pub kill: Option<bool>,
    #[serde(default)]
    pub difficulty: Option<i32>,
    #[serde(default)]
    pub boss_percentage: Option<f64>,
    #[serde(default)]
    pub average_item_level: Option<f64>,
    #[serde(default, rename = "encounterID")]
    pub encounter_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MasterData {
    #[serde(default)]
    pub actors: Vec<ActorMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorMeta {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub actor_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub pet_owner: Option<i32>,
}

impl ActorMeta {
    pub fn is_player(&self) -> bool {
        self.actor_type == "Player"
    }

    /// Spec label, taken from icons of the form `Class-Spec`.
    pub fn spec(&self) -> Option<&str> {
        self.icon
            .as_deref()
            .and_then(|icon| icon.split_once('-'))
            .map(|(_, spec)| spec)
            .filter(|spec| !spec.is_empty())
    }
}

/// One page of a cursor walk.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<RawEvent>,
    /// Where the next page starts, `None` once the provider has nothing more.
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportDataEnvelope<T> {
    pub report_data: ReportEnvelope<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportEnvelope<T> {
    pub report: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsField {
    pub events: EventsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventsPayload {
    #[serde(default)]
    pub data: Vec<RawEvent>,
    #[serde(default, deserialize_with = "opt_millis")]
    pub next_page_timestamp: Option<i64>,
}

impl From<EventsPayload> for EventPage {
    fn from(payload: EventsPayload) -> Self {
        Self {
            events: payload.data,
            next_cursor: payload.next_page_timestamp,
        }
    }
}
