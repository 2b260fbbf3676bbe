mod handler;
mod model;

pub use handler::{
    active_membership,
    cancel_membership,
    create_membership,
    delete_membership,
    expire_overdue,
    list_memberships,
    update_membership,
};
