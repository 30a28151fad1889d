pub mod app_settings;
pub mod app_state;
pub mod channel;
pub mod credentials;
pub mod feeds;
pub mod messages;
pub mod network;
pub mod refresher;
pub mod ticker;
