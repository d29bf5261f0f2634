//! Domain services for Geofication.
//!
//! Services contain business logic that operates on domain models, and the
//! boundary traits the pipeline talks to.

pub mod geofencing;
pub mod notification;
pub mod trigger_policy;

pub use geofencing::{
    GeofencingClient, GeofencingError, InMemoryGeofencingClient, RegionRequest,
    DEFAULT_MAX_REGIONS,
};
pub use notification::{
    DispatchResult, LoggingNotificationDispatcher, MockNotificationDispatcher,
    NotificationDispatcher,
};
pub use trigger_policy::{evaluate, plan_transition, FiringRule, TransitionPlan, TriggerDecision};
