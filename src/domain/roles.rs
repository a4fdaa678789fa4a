use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::status::{OrderStatus, UnknownStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Farmer,
    PickupAgent,
    Cr,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Customer,
        Role::Farmer,
        Role::PickupAgent,
        Role::Cr,
        Role::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Farmer => "FARMER",
            Role::PickupAgent => "PICKUP_AGENT",
            Role::Cr => "CR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Everything a handler may need to authorize. One capability check per
/// handler; ownership predicates are passed in by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ApproveUser,
    CreateListing,
    ApproveListing,
    RestockListing,
    BrowseListings,
    PlaceOrder,
    UpdateOrderStatus,
    AssignAgent,
    ConfirmCashCollected,
    RequestRefund,
    ReviewRefund,
    RequestPayout,
    ReviewPayout,
    ViewEarnings,
}

impl Role {
    pub fn permits(self, action: Action) -> bool {
        if self == Role::Admin {
            return true;
        }
        matches!(
            (self, action),
            (Role::Farmer, Action::CreateListing)
                | (Role::Farmer, Action::RestockListing)
                | (Role::Farmer, Action::RequestPayout)
                | (Role::Farmer, Action::ViewEarnings)
                | (Role::Farmer, Action::UpdateOrderStatus)
                | (Role::Customer, Action::BrowseListings)
                | (Role::Customer, Action::PlaceOrder)
                | (Role::Customer, Action::RequestRefund)
                | (Role::Customer, Action::UpdateOrderStatus)
                | (Role::Cr, Action::UpdateOrderStatus)
                | (Role::Cr, Action::AssignAgent)
                | (Role::PickupAgent, Action::UpdateOrderStatus)
                | (Role::PickupAgent, Action::ConfirmCashCollected)
        )
    }
}

/// Per-order refinement of `UpdateOrderStatus`: which transition a given
/// caller may apply to a given order. CRs coordinate every order in the
/// network and are not narrowed here.
pub fn may_update_order(
    role: Role,
    requested: OrderStatus,
    is_owner: bool,
    sells_in_order: bool,
    is_assigned_agent: bool,
) -> bool {
    match role {
        Role::Admin | Role::Cr => true,
        Role::Customer => is_owner && requested == OrderStatus::Cancelled,
        Role::Farmer => sells_in_order,
        Role::PickupAgent => is_assigned_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_allowed_everything() {
        for action in [
            Action::ApproveUser,
            Action::ReviewPayout,
            Action::ReviewRefund,
            Action::AssignAgent,
        ] {
            assert!(Role::Admin.permits(action));
        }
    }

    #[test]
    fn review_actions_are_admin_only() {
        for role in [Role::Customer, Role::Farmer, Role::PickupAgent, Role::Cr] {
            assert!(!role.permits(Action::ReviewPayout));
            assert!(!role.permits(Action::ReviewRefund));
            assert!(!role.permits(Action::ApproveUser));
            assert!(!role.permits(Action::ApproveListing));
        }
    }

    #[test]
    fn customers_may_only_cancel_their_own_order() {
        assert!(may_update_order(
            Role::Customer,
            OrderStatus::Cancelled,
            true,
            false,
            false
        ));
        assert!(!may_update_order(
            Role::Customer,
            OrderStatus::Cancelled,
            false,
            false,
            false
        ));
        assert!(!may_update_order(
            Role::Customer,
            OrderStatus::Delivered,
            true,
            false,
            false
        ));
    }

    #[test]
    fn farmers_need_an_item_in_the_order() {
        assert!(may_update_order(
            Role::Farmer,
            OrderStatus::PickedUp,
            false,
            true,
            false
        ));
        assert!(!may_update_order(
            Role::Farmer,
            OrderStatus::PickedUp,
            false,
            false,
            false
        ));
    }

    #[test]
    fn agents_need_the_assignment() {
        assert!(may_update_order(
            Role::PickupAgent,
            OrderStatus::OutForDelivery,
            false,
            false,
            true
        ));
        assert!(!may_update_order(
            Role::PickupAgent,
            OrderStatus::OutForDelivery,
            false,
            false,
            false
        ));
    }

    #[test]
    fn role_tokens_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("SUPERUSER".parse::<Role>().is_err());
    }
}
