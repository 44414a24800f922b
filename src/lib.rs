//! Token renewal coordination for single-page applications.
//!
//! The identity-provider exchange itself (token endpoint calls, PKCE, redirect parsing) lives in
//! the background auth context; this crate only coordinates the asynchronous message protocol
//! around it. Every browser surface is reached through a trait in [`host`] or [`intercept`], so
//! the same state machine runs against real contexts or the in-memory doubles in
//! [`host::memory`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod adapter;
pub mod auth;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod governor;
pub mod host;
pub mod intercept;
pub mod ledger;
pub mod obs;
pub mod protocol;

pub use coordinator::{Coordinator, CoordinatorState, Handlers, HostEnvironment};

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::ClientId;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::{Origin, Url};

	pub use crate::error::{Error, Result};
}

pub use oauth2;
pub use url;
#[cfg(test)] use color_eyre as _;
