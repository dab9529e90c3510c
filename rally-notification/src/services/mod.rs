pub mod notification_service;
pub mod read_state;
