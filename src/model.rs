use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open time range `[start, end)` on naive local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Touching boundaries do not overlap: `[10:00,11:00)` and `[11:00,12:00)` are disjoint.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// The two bookable pools. Alternatives are only ever proposed inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceGroup {
    MeetingRoom,
    TestDevice,
}

impl ResourceGroup {
    pub fn prefix(&self) -> &'static str {
        match self {
            ResourceGroup::MeetingRoom => "room",
            ResourceGroup::TestDevice => "device",
        }
    }
}

/// One bookable entity within a fixed-size pool, e.g. `room3` or `device12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    pub group: ResourceGroup,
    pub index: u8,
}

impl ResourceId {
    pub fn new(group: ResourceGroup, index: u8) -> Self {
        debug_assert!(index >= 1, "resource indices start at 1");
        Self { group, index }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.group.prefix(), self.index)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for group in [ResourceGroup::MeetingRoom, ResourceGroup::TestDevice] {
            if let Some(rest) = s.strip_prefix(group.prefix()) {
                let index: u8 = rest
                    .parse()
                    .map_err(|_| format!("invalid resource index in {s:?}"))?;
                if index == 0 {
                    return Err(format!("resource index must be >= 1 in {s:?}"));
                }
                return Ok(ResourceId::new(group, index));
            }
        }
        Err(format!("unknown resource name {s:?}"))
    }
}

impl TryFrom<String> for ResourceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Closed,
}

/// A committed claim on a resource. Owned exclusively by the store; mutated
/// only through full-record replacement on an update commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub resource: ResourceId,
    #[serde(flatten)]
    pub slot: Slot,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_text: Option<String>,
    pub status: Status,
}

// ── Event log records ─────────────────────────────────────────────

/// Parameters of a deterministic seeding run. Replaying these through the
/// generator reproduces the exact records, ids included, which is what makes
/// seed events replayable during recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicSeedParams {
    pub start_date: NaiveDate,
    pub now: NaiveDateTime,
    pub overwrite: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeSeedParams {
    pub start_date: NaiveDate,
    pub days: u32,
    pub slots_per_day: u32,
    pub now: NaiveDateTime,
    pub overwrite: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificSeedParams {
    pub resource: ResourceId,
    pub now: NaiveDateTime,
    pub overwrite_resource: bool,
    pub count: usize,
}

/// What a recovery pass rebuilt, recorded in the YAML_RECOVERED event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryNote {
    pub file: String,
    pub backup: Option<String>,
    pub reason: String,
    pub active_count: usize,
    pub closed_count: usize,
    pub reservation_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum EventKind {
    #[serde(rename = "RESERVATION_CREATED")]
    ReservationCreated(Reservation),
    #[serde(rename = "RESERVATION_UPDATED")]
    ReservationUpdated(Reservation),
    #[serde(rename = "RESERVATION_CLOSED")]
    ReservationClosed(Reservation),
    #[serde(rename = "TEST_DATA_GENERATED")]
    TestDataGenerated(BasicSeedParams),
    #[serde(rename = "TEST_DATA_GENERATED_SPECIFIC_RESOURCE")]
    TestDataGeneratedSpecificResource(SpecificSeedParams),
    #[serde(rename = "TEST_DATA_GENERATED_LARGE")]
    TestDataGeneratedLarge(LargeSeedParams),
    #[serde(rename = "YAML_RECOVERED")]
    YamlRecovered(RecoveryNote),
}

/// One append-only entry in the event log, written as part of the same
/// durable operation as the data mutation it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_time: NaiveDateTime,
    #[serde(flatten)]
    pub kind: EventKind,
}

// ── Tagged reservation outcomes ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStrategy {
    TimeShiftBefore,
    TimeShiftAfter,
    OtherResourceSameTime,
    OtherResourceShifted,
}

/// A non-conflicting slot suggested on conflict. Advisory only; committing
/// one requires an explicit follow-up call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub strategy: ProposalStrategy,
    pub resource: ResourceId,
    #[serde(flatten)]
    pub slot: Slot,
}

/// Exhaustive outcome of a reservation attempt: callers branch on this
/// instead of inspecting ad hoc payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Confirmed(Reservation),
    Conflict {
        existing: Vec<Reservation>,
        alternatives: Vec<Proposal>,
    },
}
