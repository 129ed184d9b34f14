pub mod inventory_transaction;
pub mod order;
pub mod order_item;
pub mod product;
