//! `RestOC` Services: local and remote dispatch behind one REST-like interface.

pub mod service;

pub use service::{
    Binding, ConfigError, NounFuture, NounTable, Request, RouterConfig, RouterError, Service,
    ServiceFault, ServiceRegistry, ServiceRouter,
};
