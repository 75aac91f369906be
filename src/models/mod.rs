pub mod audit;
pub mod campaign;
pub mod dispatch;
pub mod fcm;
pub mod filter;
pub mod food;
pub mod health;
pub mod notification;
pub mod profile;
pub mod recipient;
pub mod response;
pub mod status;
pub mod validation;
