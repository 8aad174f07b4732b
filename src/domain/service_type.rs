//! Service taxonomy and the per-type slot schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The four kinds of local service an order can be for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Buy goods at a shop and deliver them.
    Shopping,
    /// Point-to-point pickup and delivery.
    Errand,
    /// A service provider visits the customer.
    HomeService,
    /// Anything else, described in free text.
    OpenRequest,
}

/// One field of a service type's slot schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotField {
    /// Key under which the value is stored in slot data.
    pub field: &'static str,
    /// Human-readable label reported in `missingFields`.
    pub label: &'static str,
    /// Whether the field gates completeness.
    pub required: bool,
}

const fn required(field: &'static str, label: &'static str) -> SlotField {
    SlotField {
        field,
        label,
        required: true,
    }
}

const fn optional(field: &'static str, label: &'static str) -> SlotField {
    SlotField {
        field,
        label,
        required: false,
    }
}

const SHOPPING_SLOTS: &[SlotField] = &[
    required("shopName", "shop name"),
    required("items", "items to buy"),
    required("deliveryAddress", "delivery address"),
    required("userBudget", "budget"),
];

const ERRAND_SLOTS: &[SlotField] = &[
    required("pickupAddress", "pickup address"),
    required("deliveryAddress", "delivery address"),
    optional("instructions", "instructions"),
    optional("timeRequirement", "time requirement"),
];

const HOME_SERVICE_SLOTS: &[SlotField] = &[
    required("serviceType", "service kind"),
    required("address", "service address"),
    required("scheduledTime", "appointment time"),
    required("details", "job details"),
    required("customerContact", "contact number"),
];

const OPEN_REQUEST_SLOTS: &[SlotField] = &[
    required("description", "request description"),
    optional("location", "location"),
    optional("timeRequirement", "time requirement"),
];

impl ServiceType {
    /// All service types, in catalog order.
    pub const ALL: [Self; 4] = [
        Self::Shopping,
        Self::Errand,
        Self::HomeService,
        Self::OpenRequest,
    ];

    /// Returns the wire name (e.g. `"home_service"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shopping => "shopping",
            Self::Errand => "errand",
            Self::HomeService => "home_service",
            Self::OpenRequest => "open_request",
        }
    }

    /// Returns a short description for catalogs.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Shopping => "Buy items from a shop and deliver them",
            Self::Errand => "Pick up an item and deliver it",
            Self::HomeService => "Book a provider for an at-home service",
            Self::OpenRequest => "Any other request, reviewed by operations",
        }
    }

    /// Returns the slot schema, required fields first in prompt order.
    #[must_use]
    pub const fn slots(&self) -> &'static [SlotField] {
        match self {
            Self::Shopping => SHOPPING_SLOTS,
            Self::Errand => ERRAND_SLOTS,
            Self::HomeService => HOME_SERVICE_SLOTS,
            Self::OpenRequest => OPEN_REQUEST_SLOTS,
        }
    }

    /// Iterates over the required fields only.
    pub fn required_slots(&self) -> impl Iterator<Item = &'static SlotField> {
        self.slots().iter().filter(|s| s.required)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopping" => Ok(Self::Shopping),
            "errand" => Ok(Self::Errand),
            "home_service" => Ok(Self::HomeService),
            "open_request" => Ok(Self::OpenRequest),
            other => Err(format!("unknown service type: {other}")),
        }
    }
}

/// Sub-kind of a home-service booking, stored under the `serviceType` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomeServiceKind {
    /// Household cleaning.
    Cleaning,
    /// Appliance repair.
    Repair,
    /// Furniture or fixture installation.
    Installation,
    /// Massage at home.
    Massage,
}

impl HomeServiceKind {
    /// Every sub-kind.
    pub const ALL: [Self; 4] = [Self::Cleaning, Self::Repair, Self::Installation, Self::Massage];

    /// Slot value and quote label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cleaning => "home cleaning",
            Self::Repair => "appliance repair",
            Self::Installation => "installation",
            Self::Massage => "home massage",
        }
    }

    /// Parses a slot value back into a sub-kind.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}
