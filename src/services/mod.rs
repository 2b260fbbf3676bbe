mod account;
mod ledger;
mod membership;

pub use account::{AccountService, LoginOutcome, RegistrationInput, ResetTicket, UserProfile};
pub use ledger::OrderLedger;
pub use membership::{CreateMembership, MembershipLifecycle, UpdateMembership};
