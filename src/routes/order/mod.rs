mod handler;
mod model;

pub use handler::{latest_order, list_orders, recent_orders, record_order};
