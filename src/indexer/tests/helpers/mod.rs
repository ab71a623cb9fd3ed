pub mod bns;
pub mod messages;
pub mod transactions;
