//! Multi-provider federation: one provider interface over N children

mod federation;
mod provider;

pub use federation::{
    AdvancedRoundRobin, FederationMethod, FederationMethodKind, Ranking, RoundRobin,
};
pub use provider::{ChildSpec, MultiProvider, ProviderInit, ALL_DATA_SOURCE_ID};
