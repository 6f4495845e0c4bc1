//! Provider bundle trait for simplified type parameters.
//!
//! This module provides a unified [`Providers`] trait that bundles the
//! three provider types into a single type parameter, eliminating type
//! parameter explosion in downstream code.
//!
//! ## Motivation
//!
//! Without bundling, code must carry three separate type parameters:
//!
//! ```text
//! struct MyStruct<N, T, TP>
//! where
//!     N: NetworkProvider + Clone + 'static,
//!     T: TimeProvider + Clone + 'static,
//!     TP: TaskProvider + Clone + 'static,
//! ```
//!
//! With bundling, this simplifies to:
//!
//! ```text
//! struct MyStruct<P: Providers>
//! ```

use crate::{
    NetworkProvider, TaskProvider, TimeProvider, TokioNetworkProvider, TokioTaskProvider,
    TokioTimeProvider,
};

/// Bundle of all provider types for a runtime environment.
///
/// This trait consolidates [`NetworkProvider`], [`TimeProvider`], and
/// [`TaskProvider`] into a single bundle. Associated types preserve type
/// information at compile time without runtime dispatch; accessor methods
/// hand out the individual providers.
pub trait Providers: Clone + 'static {
    /// Network provider type for opening transports.
    type Network: NetworkProvider + Clone + 'static;

    /// Time provider type for sleep, timeout, and time queries.
    type Time: TimeProvider + Clone + 'static;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider + Clone + 'static;

    /// Get the network provider instance.
    fn network(&self) -> &Self::Network;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;
}

/// Production providers using the Tokio runtime.
///
/// ## Example
///
/// ```rust,ignore
/// use hawser_core::{Providers, TokioProviders};
///
/// let providers = TokioProviders::new();
/// let time_now = providers.time().now();
/// ```
#[derive(Clone)]
pub struct TokioProviders {
    network: TokioNetworkProvider,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl TokioProviders {
    /// Create a new production providers bundle.
    pub fn new() -> Self {
        Self {
            network: TokioNetworkProvider::new(),
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
        }
    }
}

impl Default for TokioProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl Providers for TokioProviders {
    type Network = TokioNetworkProvider;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;

    fn network(&self) -> &Self::Network {
        &self.network
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }
}
