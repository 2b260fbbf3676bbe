mod membership;
mod order;
mod user;

pub use membership::{Membership, MembershipChanges, MembershipStatus, NewMembership, PlanTier};
pub use order::{NewOrder, Order, PaymentMethod, round_to_cents};
pub use user::{NewUser, User, UserChanges};
