#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod gc;
pub mod keyspace;
pub mod lease;
pub mod mutex;
pub mod redis_store;
pub mod router;
pub mod store;
pub mod time;
pub mod waiter;

pub mod test_utils;

pub use config::MutexConfig;
pub use error::{Error, Result};
pub use keyspace::Keyspace;
pub use lease::{Acquire, LeaseManager};
pub use mutex::{Gate, Mutex, Outcome};
pub use redis_store::RedisStore;
pub use router::{Router, Watch};
pub use store::Store;
