pub mod clock;
pub mod config;
pub mod conflation;
mod error;
pub mod generator;
pub mod limiter;
pub mod model;
pub mod publisher;
pub mod session;

pub use clock::{Clock, ManualClock, MonoClock};
pub use config::ThrottleConfig;
pub use conflation::ConflationStore;
pub use error::ThrottleError;
pub use generator::MarketDataGenerator;
pub use limiter::{Admission, BudgetCharge, LimiterConfig, LimiterMetrics, RateLimiter};
pub use model::{MarketUpdate, Price};
pub use publisher::{PassReport, PublishFailurePolicy, ThrottledPublisher, UpdateSink};
pub use session::{DrainerHandle, ThrottleSession, UpdateHandler};
