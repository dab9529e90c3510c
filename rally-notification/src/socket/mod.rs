pub mod dispatcher;
pub mod handlers;
pub mod registry;

/// The production registry, keyed by Socket.IO session ids.
pub type PushRegistry = registry::ConnectionRegistry<socketioxide::socket::Sid>;
