pub mod activity;
pub mod node;
pub mod sla;
pub mod ticket;
