pub mod allocator;
pub mod config;
pub mod journal;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod observability;
pub mod recorder;
pub mod reference;
pub mod scheduler;
pub mod validator;
