pub mod bus;
pub mod coordinator;
pub mod errors;
pub mod metrics;
pub mod notification;
#[cfg(feature = "redis")]
pub mod redis_transport;
pub mod request;
pub mod transport;

pub use bus::{BusOptions, NotificationBus, DEFAULT_CHANNEL};
pub use coordinator::{CoordinatorState, ReloadCoordinator, ReloadOptions};
pub use errors::{NotificationError, ReloadError, TransportError};
pub use notification::{Notification, NotificationCommand, SIGNATURE_ALGORITHM};
#[cfg(feature = "redis")]
pub use redis_transport::RedisPubSub;
pub use request::{ReloadCallback, ReloadQueue, ReloadRequest};
pub use transport::{InMemoryPubSub, PubSubTransport, Subscription};
