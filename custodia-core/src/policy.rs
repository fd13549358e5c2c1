use crate::identity::Role;
use uuid::Uuid;

/// Everything an actor can attempt against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateOrder,
    AdvanceOrder,
    CancelOrder,
    ReadOrder,
    ListAllOrders,
    OpenDispute,
    ReviewDispute,
    ResolveDispute,
    CloseDispute,
    ManageEscrow,
    ReadTransaction,
}

/// The parties with a stake in the resource under evaluation. Empty for
/// resources that have no ownership (e.g. list-all reads).
#[derive(Debug, Clone, Copy, Default)]
pub struct Stakeholders {
    pub buyer_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
}

impl Stakeholders {
    pub fn of(buyer_id: Uuid, seller_id: Uuid) -> Self {
        Self {
            buyer_id: Some(buyer_id),
            seller_id: Some(seller_id),
        }
    }

    fn is_buyer(&self, actor_id: Uuid) -> bool {
        self.buyer_id == Some(actor_id)
    }

    fn is_seller(&self, actor_id: Uuid) -> bool {
        self.seller_id == Some(actor_id)
    }

    fn is_party(&self, actor_id: Uuid) -> bool {
        self.is_buyer(actor_id) || self.is_seller(actor_id)
    }
}

/// Pure authorization check. No side effects, no I/O; callers load the
/// resource first and hand over its stakeholders.
pub fn can(role: Role, actor_id: Uuid, action: Action, resource: &Stakeholders) -> bool {
    match role {
        Role::Buyer => match action {
            Action::CreateOrder => resource.is_buyer(actor_id),
            Action::CancelOrder => resource.is_buyer(actor_id),
            Action::ReadOrder => resource.is_buyer(actor_id),
            Action::OpenDispute => resource.is_buyer(actor_id),
            Action::ReadTransaction => true,
            _ => false,
        },
        Role::Seller => match action {
            Action::AdvanceOrder => resource.is_seller(actor_id),
            Action::CancelOrder => resource.is_seller(actor_id),
            Action::ReadOrder => resource.is_seller(actor_id),
            Action::OpenDispute => resource.is_seller(actor_id),
            Action::ReadTransaction => true,
            _ => false,
        },
        Role::Arbitrator => matches!(
            action,
            Action::ReviewDispute
                | Action::ResolveDispute
                | Action::CloseDispute
                | Action::ReadOrder
        ),
        Role::Admin => matches!(
            action,
            Action::ListAllOrders
                | Action::ReadOrder
                | Action::ManageEscrow
                | Action::ReadTransaction
                | Action::CloseDispute
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_truth_table() {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let owned = Stakeholders::of(buyer, seller);
        let nobody = Stakeholders::default();

        // (role, actor, action, resource, expected)
        let table: Vec<(Role, Uuid, Action, &Stakeholders, bool)> = vec![
            (Role::Buyer, buyer, Action::CreateOrder, &owned, true),
            (Role::Buyer, stranger, Action::CreateOrder, &owned, false),
            (Role::Buyer, buyer, Action::AdvanceOrder, &owned, false),
            (Role::Buyer, buyer, Action::CancelOrder, &owned, true),
            (Role::Buyer, buyer, Action::OpenDispute, &owned, true),
            (Role::Buyer, buyer, Action::ResolveDispute, &owned, false),
            (Role::Buyer, buyer, Action::ListAllOrders, &nobody, false),
            (Role::Seller, seller, Action::AdvanceOrder, &owned, true),
            (Role::Seller, stranger, Action::AdvanceOrder, &owned, false),
            (Role::Seller, seller, Action::CreateOrder, &owned, false),
            (Role::Seller, seller, Action::OpenDispute, &owned, true),
            (Role::Seller, seller, Action::ReadOrder, &owned, true),
            (Role::Seller, seller, Action::ManageEscrow, &nobody, false),
            (Role::Arbitrator, stranger, Action::ResolveDispute, &nobody, true),
            (Role::Arbitrator, stranger, Action::ReviewDispute, &nobody, true),
            (Role::Arbitrator, stranger, Action::CloseDispute, &nobody, true),
            (Role::Arbitrator, stranger, Action::AdvanceOrder, &owned, false),
            (Role::Arbitrator, stranger, Action::CreateOrder, &owned, false),
            (Role::Admin, stranger, Action::ListAllOrders, &nobody, true),
            (Role::Admin, stranger, Action::ReadOrder, &owned, true),
            (Role::Admin, stranger, Action::ManageEscrow, &nobody, true),
            (Role::Admin, stranger, Action::AdvanceOrder, &owned, false),
            (Role::Admin, stranger, Action::ResolveDispute, &nobody, false),
        ];

        for (role, actor, action, resource, expected) in table {
            assert_eq!(
                can(role, actor, action, resource),
                expected,
                "role={:?} action={:?}",
                role,
                action
            );
        }
    }

    #[test]
    fn test_non_stakeholder_never_acts_on_owned_resource() {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let owned = Stakeholders::of(buyer, seller);

        for action in [
            Action::CreateOrder,
            Action::AdvanceOrder,
            Action::CancelOrder,
            Action::ReadOrder,
            Action::OpenDispute,
        ] {
            assert!(!can(Role::Buyer, stranger, action, &owned));
            assert!(!can(Role::Seller, stranger, action, &owned));
        }
    }
}
