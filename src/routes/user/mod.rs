mod handler;
mod model;

pub use handler::{
    delete_user,
    login,
    me,
    register,
    reset_password,
    update_profile,
    verify_security,
};
