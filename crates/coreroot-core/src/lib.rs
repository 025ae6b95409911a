pub mod error;
pub mod id;
pub mod resource;
pub mod time;

pub use error::{CoreError, Result};
pub use id::{ExternalId, SurrogateKey};
pub use resource::{Resource, ResourceKind, ResourceOwnership, ResourceRef};
pub use time::{Clock, ManualClock, SharedClock, SystemClock, now_utc};
