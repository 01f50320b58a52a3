// Copyright © 2019-2020 The Radicle Foundation <hello@radicle.foundation>
//
// This file is part of radicle-link, distributed under the GPLv3 with Radicle
// Linking Exception. For full terms see the included LICENSE file.

//! Initialise logging/tracing.
//!
//! Stdout is the remote-helper protocol channel (§4.G), so the subscriber
//! is *always* wired to stderr — writing a log line to stdout would corrupt
//! the dialog with the VCS driver.

use tracing_subscriber::{layer::SubscriberExt as _, reload, EnvFilter};

/// A handle to the installed filter, used by the protocol driver to apply
/// `option verbosity N` (§4.G) after startup.
pub type Handle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// The three verbosity levels the protocol driver's `option verbosity N`
/// command can select (§3, §4.G).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Verbosity {
    Error,
    Info,
    Debug,
}

impl Verbosity {
    /// `git`'s remote-helper protocol sends an integer verbosity; 0 and
    /// below is errors-only, 1 is informational, 2 and above is debug.
    pub fn from_level(n: i64) -> Self {
        match n {
            n if n <= 0 => Verbosity::Error,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Error
    }
}

/// Install a global tracing subscriber at the given verbosity, writing to
/// stderr, and return a handle that later `option verbosity N` lines use to
/// raise or lower it without reinstalling the subscriber.
pub fn init(verbosity: Verbosity) -> Handle {
    let _ = env_logger::builder().is_test(false).try_init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.as_filter()));
    let (filter, handle) = reload::Layer::new(filter);

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
    handle
}

/// Applies `option verbosity N` (§4.G) to the running subscriber. Returns
/// `false` if the handle's subscriber has since been dropped, which the
/// driver treats as `unsupported`.
pub fn set_verbosity(handle: &Handle, verbosity: Verbosity) -> bool {
    handle
        .modify(|filter| *filter = EnvFilter::new(verbosity.as_filter()))
        .is_ok()
}
