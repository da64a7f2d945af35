use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------      UserId        ----------------------------------------------------------
/// A lightweight wrapper around the opaque principal identifier attached by the upstream auth
/// gateway. The engine only ever compares these; it never authenticates them.
#[derive(Clone, Debug, Type, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for UserId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   ListingStatus    ----------------------------------------------------------
/// The mutually exclusive lifecycle states of a listing. `Available` and `Sold` are terminal with
/// respect to the handover protocol; every non-terminal state may exit early via cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ListingStatus {
    /// The listing is up for grabs. No reservation exists.
    Available,
    /// A buyer holds the reservation, but no meeting has been proposed yet.
    Reserved,
    /// The seller has put forward one or more candidate meeting locations.
    LocationProposed,
    /// The buyer has picked one of the candidate locations.
    LocationSelected,
    /// An exchange code has been issued for the meeting.
    OtpGenerated,
    /// The handover has been verified. End of the road.
    Sold,
}

impl ListingStatus {
    /// True while a reservation exists, i.e. `reserved_by` must be set.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, ListingStatus::Available | ListingStatus::Sold)
    }

    /// States in which a reschedule request may be raised or resolved.
    pub fn allows_reschedule(&self) -> bool {
        matches!(self, ListingStatus::LocationSelected | ListingStatus::OtpGenerated)
    }

    /// States in which either party may still cancel outright. Once a code has been issued, only a
    /// dispute may be raised.
    pub fn allows_cancellation(&self) -> bool {
        matches!(self, ListingStatus::Reserved | ListingStatus::LocationProposed | ListingStatus::LocationSelected)
    }
}

impl Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Available => write!(f, "Available"),
            ListingStatus::Reserved => write!(f, "Reserved"),
            ListingStatus::LocationProposed => write!(f, "LocationProposed"),
            ListingStatus::LocationSelected => write!(f, "LocationSelected"),
            ListingStatus::OtpGenerated => write!(f, "OtpGenerated"),
            ListingStatus::Sold => write!(f, "Sold"),
        }
    }
}

impl FromStr for ListingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(Self::Available),
            "Reserved" => Ok(Self::Reserved),
            "LocationProposed" => Ok(Self::LocationProposed),
            "LocationSelected" => Ok(Self::LocationSelected),
            "OtpGenerated" => Ok(Self::OtpGenerated),
            "Sold" => Ok(Self::Sold),
            s => Err(ConversionError(format!("Invalid listing status: {s}"))),
        }
    }
}

impl From<String> for ListingStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid listing status: {value}. But this conversion cannot fail. Defaulting to Available");
            ListingStatus::Available
        })
    }
}

//--------------------------------------    Reservation     ----------------------------------------------------------
/// The reservation state of a listing, derived from the nullable columns on the row so that the
/// "reserved but nobody holds it" state is unrepresentable in code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Open,
    Held { buyer: UserId, since: DateTime<Utc> },
}

impl Reservation {
    pub fn holder(&self) -> Option<&UserId> {
        match self {
            Reservation::Open => None,
            Reservation::Held { buyer, .. } => Some(buyer),
        }
    }
}

//--------------------------------------      Listing       ----------------------------------------------------------
/// One physical unit for sale. Mutated exclusively through the state machine.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Listing {
    pub id: i64,
    pub seller_id: UserId,
    pub title: String,
    pub status: ListingStatus,
    pub reserved_by: Option<UserId>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub reschedule_requested_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn reservation(&self) -> Reservation {
        match (&self.reserved_by, self.reserved_at) {
            (Some(buyer), Some(since)) => Reservation::Held { buyer: buyer.clone(), since },
            _ => Reservation::Open,
        }
    }

    pub fn is_reserved_by(&self, user: &UserId) -> bool {
        self.reserved_by.as_ref() == Some(user)
    }

    pub fn is_seller(&self, user: &UserId) -> bool {
        &self.seller_id == user
    }

    /// True while a reschedule request is pending. All forward progress on the exchange code is
    /// blocked until the request is resolved.
    pub fn has_pending_reschedule(&self) -> bool {
        self.reschedule_requested_by.is_some()
    }

    /// The counterparty of `user` in this transaction, if `user` is one of the two parties.
    pub fn counterparty_of(&self, user: &UserId) -> Option<&UserId> {
        if self.is_seller(user) {
            self.reserved_by.as_ref()
        } else if self.is_reserved_by(user) {
            Some(&self.seller_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub seller_id: UserId,
    pub title: String,
}

impl NewListing {
    pub fn new<S: Into<UserId>, T: Into<String>>(seller_id: S, title: T) -> Self {
        Self { seller_id: seller_id.into(), title: title.into() }
    }
}

//--------------------------------------    MeetingPlace    ----------------------------------------------------------
/// The fixed set of sanctioned on-campus meeting points. Sellers may only propose spots from this
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum MeetingPlace {
    LibraryFoyer,
    StudentUnion,
    CampusCafe,
    SportsComplex,
    MainGate,
    HostelParking,
}

impl Display for MeetingPlace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingPlace::LibraryFoyer => write!(f, "LibraryFoyer"),
            MeetingPlace::StudentUnion => write!(f, "StudentUnion"),
            MeetingPlace::CampusCafe => write!(f, "CampusCafe"),
            MeetingPlace::SportsComplex => write!(f, "SportsComplex"),
            MeetingPlace::MainGate => write!(f, "MainGate"),
            MeetingPlace::HostelParking => write!(f, "HostelParking"),
        }
    }
}

impl FromStr for MeetingPlace {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LibraryFoyer" => Ok(Self::LibraryFoyer),
            "StudentUnion" => Ok(Self::StudentUnion),
            "CampusCafe" => Ok(Self::CampusCafe),
            "SportsComplex" => Ok(Self::SportsComplex),
            "MainGate" => Ok(Self::MainGate),
            "HostelParking" => Ok(Self::HostelParking),
            s => Err(ConversionError(format!("Invalid meeting place: {s}"))),
        }
    }
}

impl From<String> for MeetingPlace {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid meeting place: {value}. But this conversion cannot fail. Defaulting to MainGate");
            MeetingPlace::MainGate
        })
    }
}

//--------------------------------------  CandidateLocation ---------------------------------------------------------
/// One proposed meeting point for a listing. At most one row per listing is selected; the full set
/// is replaced whenever the seller re-proposes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CandidateLocation {
    pub id: i64,
    pub listing_id: i64,
    pub place: MeetingPlace,
    pub meeting_time: Option<String>,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

/// A seller-submitted candidate, before it has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedLocation {
    pub place: MeetingPlace,
    pub meeting_time: Option<String>,
}

impl ProposedLocation {
    pub fn new(place: MeetingPlace) -> Self {
        Self { place, meeting_time: None }
    }

    pub fn at_time<S: Into<String>>(mut self, time: S) -> Self {
        self.meeting_time = Some(time.into());
        self
    }
}

//--------------------------------------   ExchangeToken    ----------------------------------------------------------
/// Number of incorrect verification attempts allowed before a token is soft-locked.
pub const MAX_OTP_ATTEMPTS: i64 = 5;

/// Proof-of-exchange secret. Only the salted hash of the code is ever stored; the plaintext exists
/// solely in the response that issues it.
#[derive(Debug, Clone, FromRow)]
pub struct ExchangeToken {
    pub id: i64,
    pub listing_id: i64,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub salt: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub failed_attempts: i64,
    pub created_at: DateTime<Utc>,
}

impl ExchangeToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn attempts_remaining(&self) -> i64 {
        (MAX_OTP_ATTEMPTS - self.failed_attempts).max(0)
    }
}

//--------------------------------------    FaultReason     ----------------------------------------------------------
/// The stated reason for a cancellation or dispute. Reasons naming a seller fault shift the
/// penalty to the seller even when the buyer initiated the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum FaultReason {
    BuyerChangedMind,
    ItemNotAsDescribed,
    SellerLate,
    SellerNoShow,
    SellerWithdrew,
    RescheduleRefused,
    Other,
}

impl FaultReason {
    pub fn is_seller_fault(&self) -> bool {
        matches!(self, FaultReason::ItemNotAsDescribed | FaultReason::SellerLate | FaultReason::SellerNoShow)
    }
}

impl Display for FaultReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultReason::BuyerChangedMind => write!(f, "BuyerChangedMind"),
            FaultReason::ItemNotAsDescribed => write!(f, "ItemNotAsDescribed"),
            FaultReason::SellerLate => write!(f, "SellerLate"),
            FaultReason::SellerNoShow => write!(f, "SellerNoShow"),
            FaultReason::SellerWithdrew => write!(f, "SellerWithdrew"),
            FaultReason::RescheduleRefused => write!(f, "RescheduleRefused"),
            FaultReason::Other => write!(f, "Other"),
        }
    }
}

impl FromStr for FaultReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BuyerChangedMind" => Ok(Self::BuyerChangedMind),
            "ItemNotAsDescribed" => Ok(Self::ItemNotAsDescribed),
            "SellerLate" => Ok(Self::SellerLate),
            "SellerNoShow" => Ok(Self::SellerNoShow),
            "SellerWithdrew" => Ok(Self::SellerWithdrew),
            "RescheduleRefused" => Ok(Self::RescheduleRefused),
            "Other" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid fault reason: {s}"))),
        }
    }
}

impl From<String> for FaultReason {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fault reason: {value}. But this conversion cannot fail. Defaulting to Other");
            FaultReason::Other
        })
    }
}

//--------------------------------------    FaultParty      ----------------------------------------------------------
/// The party charged a trust penalty for a non-happy-path exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum FaultParty {
    Buyer,
    Seller,
}

impl Display for FaultParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultParty::Buyer => write!(f, "Buyer"),
            FaultParty::Seller => write!(f, "Seller"),
        }
    }
}

impl FromStr for FaultParty {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buyer" => Ok(Self::Buyer),
            "Seller" => Ok(Self::Seller),
            s => Err(ConversionError(format!("Invalid fault party: {s}"))),
        }
    }
}

impl From<String> for FaultParty {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fault party: {value}. But this conversion cannot fail. Defaulting to Buyer");
            FaultParty::Buyer
        })
    }
}

//--------------------------------------    RecordKind      ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RecordKind {
    Cancellation,
    Dispute,
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Cancellation => write!(f, "Cancellation"),
            RecordKind::Dispute => write!(f, "Dispute"),
        }
    }
}

impl From<String> for RecordKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Dispute" => RecordKind::Dispute,
            _ => RecordKind::Cancellation,
        }
    }
}

//-------------------------------------- CancellationRecord ----------------------------------------------------------
/// Append-only audit trail entry for cancellations and disputes. Never mutated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CancellationRecord {
    pub id: i64,
    pub listing_id: i64,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub cancelled_by: UserId,
    pub status_at_cancellation: ListingStatus,
    pub fault: FaultParty,
    pub reason: FaultReason,
    pub details: Option<String>,
    pub kind: RecordKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCancellationRecord {
    pub listing_id: i64,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub cancelled_by: UserId,
    pub status_at_cancellation: ListingStatus,
    pub fault: FaultParty,
    pub reason: FaultReason,
    pub details: Option<String>,
    pub kind: RecordKind,
}

//--------------------------------------     NewDispute     ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDispute {
    pub reason: FaultReason,
    pub details: Option<String>,
    pub evidence_url: Option<String>,
}
