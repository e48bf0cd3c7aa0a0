//! Shared primitive IDs and object-type enums.

use serde::{Deserialize, Serialize};

/// Tenant identifier; also the partition key of every object.
pub type TenantId = String;
/// Object identifier, unique within a tenant and object type.
pub type ObjectId = String;
/// Monotonic operation sequence number.
pub type OpSeq = u64;

/// Kind of object stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    /// Sellable or purchasable product.
    Product,
    /// Scheduled event.
    Event,
    /// Registration of a party for an event.
    Registration,
    /// Reserved resource or seat.
    Reservation,
    /// Saved list view.
    View,
    /// Workspace grouping views.
    Workspace,
    /// Sales order carrying lines.
    SalesOrder,
    /// Purchase order carrying lines.
    PurchaseOrder,
}

impl ObjectType {
    /// All object types, in sort-key order of their names.
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Product,
        ObjectType::Event,
        ObjectType::Registration,
        ObjectType::Reservation,
        ObjectType::View,
        ObjectType::Workspace,
        ObjectType::SalesOrder,
        ObjectType::PurchaseOrder,
    ];

    /// Wire and sort-key name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Event => "event",
            Self::Registration => "registration",
            Self::Reservation => "reservation",
            Self::View => "view",
            Self::Workspace => "workspace",
            Self::SalesOrder => "salesOrder",
            Self::PurchaseOrder => "purchaseOrder",
        }
    }

    /// Parses a wire name; returns `None` for unknown types.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// True for order types whose body carries a `lines` array.
    pub fn has_lines(&self) -> bool {
        matches!(self, Self::SalesOrder | Self::PurchaseOrder)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
