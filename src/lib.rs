//! Federated search client library
//!
//! This crate executes search queries against one or more search backends
//! and merges the results into a single, UI-agnostic result model:
//!
//! - **Query model**: filter trees, paging, sorting, facet options
//! - **Providers**: an OData-flavored single-backend provider and a
//!   multi-provider that federates N child providers behind one catalog
//! - **Executor**: multi-select facet sub-queries, folder navigation mode,
//!   client-side facet merge
//! - **Facet formatting**: operator-aware labels, positions, the
//!   "Search In" data source facet
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             SearchExecutor                   │
//! │  main query + chart sub-queries + merge      │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//! ┌──────────────────┐    ┌──────────────────────┐
//! │  OdataProvider   │    │    MultiProvider     │
//! │  one backend     │    │  fan-out + federate  │
//! └──────────────────┘    └──────────┬───────────┘
//!                                    │
//!                         child providers (N)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fedsearch::executor::SearchExecutor;
//! use fedsearch::provider::MultiProvider;
//! use fedsearch::query::{Filter, SearchQuery};
//! use fedsearch::Config;
//! use std::sync::Arc;
//!
//! # async fn run() -> fedsearch::Result<()> {
//! let config = Config::load()?;
//! let provider = MultiProvider::from_config(&config).await?;
//! let executor = SearchExecutor::new(Arc::new(provider));
//!
//! let query = SearchQuery::new(Filter::new("All").with_search_term("contract"))
//!     .with_facets(true)
//!     .with_multi_select_facets(true);
//! let result = executor.execute(&query).await?;
//! println!("{} hits", result.total_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod datasource;
pub mod error;
pub mod executor;
pub mod facets;
pub mod provider;
pub mod query;
pub mod result;

pub use config::Config;
pub use error::{Result, SearchError};
