pub mod branding;
pub mod chat;
pub mod price;
pub mod requests;
pub mod server;
pub mod transactions;
pub mod users;
