pub mod domain;
pub mod ports;
pub mod review;

pub use domain::{
    Identity, Lead, LeadPage, LeadQuery, LeadStatus, PasswordChange, Product, StatusFilter,
};
pub use ports::{AuthGateway, LeadRepository, PortError, PortResult};
pub use review::{DecisionKind, DecisionPayload, LeadReview, ReviewError, ReviewStage};
