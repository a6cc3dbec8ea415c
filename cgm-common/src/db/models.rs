//! Database models
//!
//! Row types for every table plus the `*Input` payloads accepted when
//! creating or replacing a row. Enumerated columns are stored as their
//! snake_case text form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service_year::MonthKey;
use crate::{Error, Result};

/// Declares a fieldless enum stored as TEXT.
///
/// The text form doubles as the serde representation, so the literals must
/// be the snake_case spelling of the variant names.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Text stored in the database
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(Error::InvalidInput(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum! {
    Gender {
        Male => "male",
        Female => "female",
    }
}

text_enum! {
    /// Congregation appointment
    Appointment {
        None => "none",
        MinisterialServant => "ministerial_servant",
        Elder => "elder",
    }
}

text_enum! {
    /// Pioneer status recorded on the member (current enrollment)
    PioneerStatus {
        None => "none",
        Auxiliary => "auxiliary",
        Regular => "regular",
        Special => "special",
    }
}

text_enum! {
    /// Privilege tags that gate meeting assignments
    Privilege {
        Chairman => "chairman",
        Prayer => "prayer",
        Treasures => "treasures",
        SpiritualGems => "spiritual_gems",
        BibleReading => "bible_reading",
        StudentParts => "student_parts",
        LivingParts => "living_parts",
        CbsConductor => "cbs_conductor",
        Reader => "reader",
        PublicSpeaker => "public_speaker",
        WatchtowerConductor => "watchtower_conductor",
        Attendant => "attendant",
        Microphone => "microphone",
        AudioVideo => "audio_video",
        Platform => "platform",
    }
}

text_enum! {
    MeetingType {
        Midweek => "midweek",
        Weekend => "weekend",
    }
}

text_enum! {
    AssignmentType {
        Chairman => "chairman",
        OpeningPrayer => "opening_prayer",
        ClosingPrayer => "closing_prayer",
        Treasures => "treasures",
        SpiritualGems => "spiritual_gems",
        BibleReading => "bible_reading",
        StartingConversation => "starting_conversation",
        FollowingUp => "following_up",
        MakingDisciples => "making_disciples",
        ExplainingBeliefs => "explaining_beliefs",
        StudentTalk => "student_talk",
        LivingPart => "living_part",
        CongregationBibleStudy => "congregation_bible_study",
        CbsReader => "cbs_reader",
        PublicTalk => "public_talk",
        WatchtowerConductor => "watchtower_conductor",
        WatchtowerReader => "watchtower_reader",
        Attendant => "attendant",
        Microphone => "microphone",
        AudioVideo => "audio_video",
        Platform => "platform",
    }
}

text_enum! {
    /// Cleaning task lifecycle
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Skipped => "skipped",
    }
}

text_enum! {
    TransactionKind {
        Contribution => "contribution",
        Expense => "expense",
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::InvalidInput(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    Ok(())
}

fn require_at_most(field: &str, value: i64, max: i64) -> Result<()> {
    if value > max {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} (got {})",
            field, max, value
        )));
    }
    Ok(())
}

/// Largest single transaction: ten billion in currency units
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Hours in a 31-day month
pub const MAX_MONTHLY_HOURS: i64 = 744;

pub const MAX_BIBLE_STUDIES: i64 = 1_000;

/// Upper bound for stock quantities and thresholds
pub const MAX_STOCK_QUANTITY: i64 = 1_000_000_000;

/// Upper bound for a territory's address count
pub const MAX_TERRITORY_SIZE: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// Groups and members
// ---------------------------------------------------------------------------

/// Field service group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub overseer_id: Option<Uuid>,
    pub assistant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupInput {
    pub name: String,
    #[serde(default)]
    pub overseer_id: Option<Uuid>,
    #[serde(default)]
    pub assistant_id: Option<Uuid>,
}

impl GroupInput {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub appointment: Appointment,
    pub pioneer_status: PioneerStatus,
    pub privileges: Vec<Privilege>,
    pub group_id: Option<Uuid>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub baptized: bool,
    pub active: bool,
}

impl Member {
    /// Build a member row from validated input
    pub fn from_input(id: Uuid, input: MemberInput) -> Self {
        let mut privileges = input.privileges;
        privileges.sort();
        privileges.dedup();

        Self {
            id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            gender: input.gender,
            appointment: input.appointment,
            pioneer_status: input.pioneer_status,
            privileges,
            group_id: input.group_id,
            email: input.email,
            phone: input.phone,
            baptized: input.baptized,
            active: input.active,
        }
    }

    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_privilege(&self, privilege: Privilege) -> bool {
        self.privileges.contains(&privilege)
    }

    /// Elder or ministerial servant
    pub fn is_appointed(&self) -> bool {
        self.appointment != Appointment::None
    }
}

fn default_true() -> bool {
    true
}

fn default_appointment() -> Appointment {
    Appointment::None
}

fn default_pioneer_status() -> PioneerStatus {
    PioneerStatus::None
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInput {
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    #[serde(default = "default_appointment")]
    pub appointment: Appointment,
    #[serde(default = "default_pioneer_status")]
    pub pioneer_status: PioneerStatus,
    #[serde(default)]
    pub privileges: Vec<Privilege>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub baptized: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl MemberInput {
    pub fn validate(&self) -> Result<()> {
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        if self.gender == Gender::Female && self.appointment != Appointment::None {
            return Err(Error::InvalidInput(
                "appointment is only valid for brothers".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Meeting assignments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    /// Monday of the meeting week
    pub week_of: NaiveDate,
    pub meeting_type: MeetingType,
    pub assignment_type: AssignmentType,
    pub assignee_id: Uuid,
    pub assistant_id: Option<Uuid>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentInput {
    pub week_of: NaiveDate,
    pub meeting_type: MeetingType,
    pub assignment_type: AssignmentType,
    pub assignee_id: Uuid,
    #[serde(default)]
    pub assistant_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Save even if the eligibility rules reject the assignee
    #[serde(default)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Cleaning and inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningTask {
    pub id: Uuid,
    pub area: String,
    pub group_id: Option<Uuid>,
    pub week_of: NaiveDate,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleaningTaskInput {
    pub area: String,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub week_of: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CleaningTaskInput {
    pub fn validate(&self) -> Result<()> {
        require_text("area", &self.area)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub min_threshold: i64,
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryItemInput {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_threshold: i64,
    #[serde(default)]
    pub unit: String,
}

impl InventoryItemInput {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_non_negative("quantity", self.quantity)?;
        require_at_most("quantity", self.quantity, MAX_STOCK_QUANTITY)?;
        require_non_negative("min_threshold", self.min_threshold)?;
        require_at_most("min_threshold", self.min_threshold, MAX_STOCK_QUANTITY)
    }
}

// ---------------------------------------------------------------------------
// Territories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: Uuid,
    pub number: String,
    pub name: String,
    pub boundaries: Option<String>,
    /// 1 (easy) to 5 (hard)
    pub difficulty: i64,
    /// Number of addresses
    pub size: i64,
    pub group_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub notes: Option<String>,
}

fn default_difficulty() -> i64 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerritoryInput {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub boundaries: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TerritoryInput {
    pub fn validate(&self) -> Result<()> {
        require_text("number", &self.number)?;
        require_text("name", &self.name)?;
        require_non_negative("size", self.size)?;
        require_at_most("size", self.size, MAX_TERRITORY_SIZE)?;
        if !(1..=5).contains(&self.difficulty) {
            return Err(Error::InvalidInput(format!(
                "difficulty must be between 1 and 5 (got {})",
                self.difficulty
            )));
        }
        Ok(())
    }
}

/// One check-out of a territory; open while `returned_on` is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryAssignment {
    pub id: Uuid,
    pub territory_id: Uuid,
    pub group_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
    pub assigned_on: NaiveDate,
    pub returned_on: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Field service reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: Uuid,
    pub member_id: Uuid,
    pub month: MonthKey,
    pub participated: bool,
    pub hours: i64,
    pub bible_studies: i64,
    pub auxiliary_pioneer: bool,
    pub regular_pioneer: bool,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyReportInput {
    pub member_id: Uuid,
    pub month: MonthKey,
    #[serde(default = "default_true")]
    pub participated: bool,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub bible_studies: i64,
    #[serde(default)]
    pub auxiliary_pioneer: bool,
    #[serde(default)]
    pub regular_pioneer: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl MonthlyReportInput {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("hours", self.hours)?;
        require_at_most("hours", self.hours, MAX_MONTHLY_HOURS)?;
        require_non_negative("bible_studies", self.bible_studies)?;
        require_at_most("bible_studies", self.bible_studies, MAX_BIBLE_STUDIES)?;
        if self.auxiliary_pioneer && self.regular_pioneer {
            return Err(Error::InvalidInput(
                "a report cannot be both auxiliary and regular pioneer".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Finance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub category: String,
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub category: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransactionInput {
    pub fn validate(&self) -> Result<()> {
        require_text("category", &self.category)?;
        if self.amount_cents <= 0 {
            return Err(Error::InvalidInput(format!(
                "amount_cents must be positive (got {})",
                self.amount_cents
            )));
        }
        require_at_most("amount_cents", self.amount_cents, MAX_AMOUNT_CENTS)
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Who a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    Member(Uuid),
    Group(Uuid),
    Everyone,
}

impl Audience {
    /// (kind, id) columns
    pub fn to_columns(&self) -> (&'static str, Option<String>) {
        match self {
            Audience::Member(id) => ("member", Some(id.to_string())),
            Audience::Group(id) => ("group", Some(id.to_string())),
            Audience::Everyone => ("everyone", None),
        }
    }

    pub fn from_columns(kind: &str, id: Option<&str>) -> Result<Self> {
        let parse = |id: Option<&str>| -> Result<Uuid> {
            let raw = id.ok_or_else(|| {
                Error::Internal(format!("audience '{}' is missing its id", kind))
            })?;
            Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("bad audience id: {}", e)))
        };

        match kind {
            "member" => Ok(Audience::Member(parse(id)?)),
            "group" => Ok(Audience::Group(parse(id)?)),
            "everyone" => Ok(Audience::Everyone),
            other => Err(Error::Internal(format!("unknown audience kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Option<Uuid>,
    pub audience: Audience,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Message as seen from one member's inbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub message: Message,
    pub read: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageInput {
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    pub audience: Audience,
    pub subject: String,
    pub body: String,
}

impl MessageInput {
    pub fn validate(&self) -> Result<()> {
        require_text("subject", &self.subject)?;
        require_text("body", &self.body)
    }
}
