use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use larder_core::ServiceError;

/// Batch shares a reservation may take, in percent of one full preparation.
pub const ALLOWED_PERCENTAGES: [u32; 20] = [
    5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 100,
];

// ---------------------------------------------------------------------------
// MealType / Special
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "breakfast" => Some(Self::Breakfast),
            "lunch" => Some(Self::Lunch),
            "dinner" => Some(Self::Dinner),
            _ => None,
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slot that is eaten without cooking from the pantry.
///
/// Special slots are excluded from ingredient accounting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Special {
    /// Food ordered in.
    Order,
    /// Eaten out.
    EatOut,
}

impl Special {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::EatOut => "eat_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "eat_out" => Some(Self::EatOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for Special {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Confirmation — the per-slot state machine
// ---------------------------------------------------------------------------

/// Whether a slot's meal has actually been cooked.
///
/// ```text
/// UNCONFIRMED ──confirm──▶ CONFIRMED
///      ▲                      │
///      └──────unconfirm───────┘
/// ```
///
/// All guard conditions live on this type; callers never flip the state by
/// hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Confirmation {
    Unconfirmed,
    Confirmed {
        /// When the meal was confirmed (RFC 3339).
        at: String,
    },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn confirmed_at(&self) -> Option<&str> {
        match self {
            Self::Confirmed { at } => Some(at),
            Self::Unconfirmed => None,
        }
    }

    /// Transition UNCONFIRMED → CONFIRMED.
    pub fn confirm(&self, slot_id: &str, at: String) -> Result<Self, ServiceError> {
        match self {
            Self::Unconfirmed => Ok(Self::Confirmed { at }),
            Self::Confirmed { .. } => Err(ServiceError::AlreadyConfirmed(format!(
                "meal slot {slot_id} is already confirmed"
            ))),
        }
    }

    /// Transition CONFIRMED → UNCONFIRMED.
    pub fn unconfirm(&self, slot_id: &str) -> Result<Self, ServiceError> {
        match self {
            Self::Confirmed { .. } => Ok(Self::Unconfirmed),
            Self::Unconfirmed => Err(ServiceError::NotConfirmed(format!(
                "meal slot {slot_id} is not confirmed"
            ))),
        }
    }

    /// Reject plan changes while the meal counts as cooked.
    pub fn ensure_editable(&self, slot_id: &str) -> Result<(), ServiceError> {
        if self.is_confirmed() {
            return Err(ServiceError::MealAlreadyConfirmed(format!(
                "meal slot {slot_id} is confirmed; unconfirm it before changing its plan"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MealSlot
// ---------------------------------------------------------------------------

/// Natural key of a meal slot: one per day and meal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    pub day: NaiveDate,
    pub meal_type: MealType,
}

impl SlotKey {
    pub fn new(day: NaiveDate, meal_type: MealType) -> Self {
        Self { day, meal_type }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.day, self.meal_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSlot {
    pub id: String,
    pub day: NaiveDate,
    pub meal_type: MealType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<Special>,
    pub confirmation: Confirmation,
    pub created_at: String,
}

impl MealSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.day, self.meal_type)
    }

    pub fn is_special(&self) -> bool {
        self.special.is_some()
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A batch share validated against [`ALLOWED_PERCENTAGES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percentage(u32);

impl Percentage {
    pub fn new(value: u32) -> Result<Self, ServiceError> {
        if ALLOWED_PERCENTAGES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ServiceError::InvalidAmount(format!(
                "percentage {value} must be a multiple of 5 between 5 and 100"
            )))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Scale a full-preparation quantity down to this share.
    pub fn of(self, quantity: f64) -> f64 {
        quantity * f64::from(self.0) / 100.0
    }
}

impl TryFrom<u32> for Percentage {
    type Error = ServiceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u32 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

/// How a reservation consumes its dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ReservationMode {
    /// The whole recipe, `portions` times.
    Portion { portions: u32 },
    /// A share of one physical preparation.
    #[serde(rename_all = "camelCase")]
    Batch {
        batch_id: String,
        percentage: Percentage,
    },
}

impl ReservationMode {
    /// Quantity this reservation claims of a recipe line.
    pub fn claim(&self, line_quantity: f64) -> f64 {
        match self {
            Self::Portion { portions } => line_quantity * f64::from(*portions),
            Self::Batch { percentage, .. } => percentage.of(line_quantity),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub slot_id: String,
    pub dish_id: String,
    #[serde(flatten)]
    pub mode: ReservationMode,
    /// Display order within the slot (insertion order).
    pub position: i64,
    pub created_at: String,
}

/// What a caller asks `reserve` for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveRequest {
    /// Cook the recipe this many whole times.
    Portions(u32),
    /// Take a share of a batch; the oldest batch with room is picked unless
    /// one is named.
    Batch {
        percentage: u32,
        batch_id: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One physical preparation of a dish, shared by percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub dish_id: String,
    pub percentage_remaining: u32,
    pub prepared_at: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    /// Unit every quantity of this ingredient is expressed in (g, ml, units…).
    pub unit: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeLine {
    pub ingredient_id: String,
    /// Quantity for one portion / one full batch.
    pub quantity: f64,
}

impl RecipeLine {
    pub fn new(ingredient_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            ingredient_id: ingredient_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lines: Vec<RecipeLine>,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

/// The two-counter balance of one ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalance {
    /// Physically on the shelf.
    pub actual: f64,
    /// `actual` minus outstanding reservations; negative means "buy more".
    pub planned: f64,
}

impl StockBalance {
    pub const ZERO: StockBalance = StockBalance {
        actual: 0.0,
        planned: 0.0,
    };
}

/// Direct pantry correction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Set,
    Add,
    Subtract,
}

impl StockOperation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "set" => Some(Self::Set),
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            _ => None,
        }
    }
}

/// An ingredient the plan needs more of than the pantry will hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortage {
    pub ingredient_id: String,
    pub name: String,
    pub unit: String,
    pub actual: f64,
    pub to_buy: f64,
}
