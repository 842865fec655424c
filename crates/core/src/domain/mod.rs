pub mod purchase_order;
pub mod request;
pub mod signature;
