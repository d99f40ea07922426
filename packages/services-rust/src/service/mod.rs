//! Dispatch layer: a uniform create/read/update/delete interface over
//! in-process and remote services.
//!
//! 1. **Contract** (`contract`): the `Service` trait and `NounTable` handler map
//! 2. **Config** (`config`): remote locations, shared secret, verbosity
//! 3. **Registry** (`registry`): name -> local instance or remote base URL
//! 4. **Router** (`router`): performs calls, local or over HTTP
//! 5. **Transport** (`transport`): the HTTP wire contract for remote calls

pub mod config;
pub mod contract;
pub mod registry;
pub mod router;
pub mod transport;

pub use config::{ConfigError, RemoteService, RouterConfig};
pub use contract::{invoke, IntoDynService, NounFuture, NounHandler, NounTable, Service, ServiceFault};
pub use registry::{Binding, Registration, ServiceRegistry};
pub use router::{Request, RouterError, ServiceRouter};
pub use transport::JSON_CONTENT_TYPE;
