// Catalog and stock
pub mod alerts;
pub mod catalog;
pub mod ledger;

// Orders
pub mod checkout;
pub mod orders;
