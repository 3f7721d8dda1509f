pub mod store;
pub mod hub;
pub mod collab;
pub mod deps;
pub mod stats;
pub mod config;

pub use store::{
    ConflictReport, FileLockEntry, HubDocument, IntegrationPoint, LockRequest, Message,
    RequestStatus, StatusUpdate, StoreError, load_document, save_document,
};
pub use hub::{BROADCAST, CommunicationHub, HubError};
pub use deps::{DependencyGraph, DependencyReport, DepsError};
pub use stats::{AgentActivity, HourlyActivity, HubStats};
pub use config::{Config, DashboardConfig, HubConfig, LogConfig, StoreConfig};
