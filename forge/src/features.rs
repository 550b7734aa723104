//! Optional compile-time features and their configure flags.
//!
//! The target's configure script accepts `--disable-<name>` and
//! `--enable-<name>` for every entry of [`FEATURE_CATALOG`]. A
//! [`FeatureToggleSet`] composes those flags from two tri-state lists and
//! predicts which self-report markers the built artifact must show.

use crate::error::{ForgeError, Result};
use std::fmt;

/// Every optional feature the target's build system understands, in the
/// order flags are emitted.
pub const FEATURE_CATALOG: [&str; 35] = [
    "help",
    "stdio",
    "fdnum",
    "file",
    "creat",
    "gopen",
    "pipe",
    "socketpair",
    "termios",
    "unix",
    "abstract-unixsocket",
    "ip4",
    "ip6",
    "rawip",
    "genericsocket",
    "interface",
    "tcp",
    "udp",
    "sctp",
    "vsock",
    "listen",
    "socks4",
    "socks4a",
    "proxy",
    "fs",
    "exec",
    "system",
    "pty",
    "readline",
    "openssl",
    "tun",
    "sycls",
    "filan",
    "retry",
    "libwrap",
];

/// Features enabled when the caller leaves the enabled list unset.
pub const DEFAULT_ENABLED: [&str; 2] = ["help", "ip4"];

/// Returns true when `name` is a catalog feature.
#[must_use]
pub fn is_known(name: &str) -> bool {
    FEATURE_CATALOG.contains(&name)
}

/// Self-report marker for a feature, e.g. `abstract-unixsocket` maps to
/// `WITH_ABSTRACT_UNIXSOCKET`.
#[must_use]
pub fn marker_for(feature: &str) -> String {
    format!("WITH_{}", feature.to_ascii_uppercase().replace('-', "_"))
}

/// A feature list that distinguishes "not configured" from "configured as
/// empty".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeatureList {
    /// No value supplied; the built-in default applies.
    #[default]
    Unset,
    /// Explicitly empty; no flags of this kind are emitted.
    Empty,
    /// Explicit names in caller order, without duplicates.
    Names(Vec<String>),
}

impl FeatureList {
    /// Parse comma- or whitespace-separated names. `None` is unset; text
    /// holding only separators is the explicit empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] for names outside the catalog.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinsmith::features::FeatureList;
    ///
    /// let list = FeatureList::parse(Some("ip4, unix listen")).expect("known names");
    /// assert_eq!(list.names(), Some(&["ip4".to_owned(), "unix".to_owned(), "listen".to_owned()][..]));
    /// assert_eq!(FeatureList::parse(Some(" , ")).expect("empty"), FeatureList::Empty);
    /// assert_eq!(FeatureList::parse(None).expect("unset"), FeatureList::Unset);
    /// ```
    pub fn parse(text: Option<&str>) -> Result<Self> {
        let Some(text) = text else {
            return Ok(Self::Unset);
        };
        Self::from_names(
            text.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|name| !name.is_empty()),
        )
    }

    /// Build an explicit list from names; no names means explicit empty.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] for names outside the catalog.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut collected: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !is_known(name) {
                return Err(ForgeError::config(format!(
                    "unknown feature \"{name}\" (see `pinsmith flags --list`)"
                )));
            }
            if !collected.iter().any(|existing| existing == name) {
                collected.push(name.to_owned());
            }
        }
        Ok(if collected.is_empty() {
            Self::Empty
        } else {
            Self::Names(collected)
        })
    }

    /// Explicit names, or `None` when unset or empty.
    #[must_use]
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Self::Names(names) => Some(names),
            Self::Unset | Self::Empty => None,
        }
    }

    fn resolve(&self, default: &[&str]) -> Vec<String> {
        match self {
            Self::Unset => default.iter().map(|name| (*name).to_owned()).collect(),
            Self::Empty => Vec::new(),
            Self::Names(names) => names.clone(),
        }
    }
}

impl fmt::Display for FeatureList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("(default)"),
            Self::Empty => f.write_str("(empty)"),
            Self::Names(names) => f.write_str(&names.join(",")),
        }
    }
}

/// The caller's feature selection.
///
/// # Examples
///
/// ```
/// use pinsmith::features::{FeatureList, FeatureToggleSet};
///
/// let toggles = FeatureToggleSet::new(
///     FeatureList::parse(Some("unix,ip6")).expect("known"),
///     FeatureList::parse(Some("unix")).expect("known"),
/// );
/// assert_eq!(toggles.configure_flags(), ["--disable-unix", "--disable-ip6", "--enable-unix"]);
/// assert_eq!(toggles.effective_set(), ["unix"]);
/// assert_eq!(toggles.expected_disabled(), ["ip6"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureToggleSet {
    disabled: FeatureList,
    enabled: FeatureList,
}

impl FeatureToggleSet {
    /// Combine a disabled and an enabled list.
    #[must_use]
    pub const fn new(disabled: FeatureList, enabled: FeatureList) -> Self {
        Self { disabled, enabled }
    }

    /// The disabled list as configured.
    #[must_use]
    pub const fn disabled(&self) -> &FeatureList {
        &self.disabled
    }

    /// The enabled list as configured.
    #[must_use]
    pub const fn enabled(&self) -> &FeatureList {
        &self.enabled
    }

    /// Names to disable, with the unset default being the whole catalog.
    #[must_use]
    pub fn disabled_names(&self) -> Vec<String> {
        self.disabled.resolve(&FEATURE_CATALOG)
    }

    /// Names to enable, with the unset default being [`DEFAULT_ENABLED`].
    #[must_use]
    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled.resolve(&DEFAULT_ENABLED)
    }

    /// Configure flags: every disable first, then every enable.
    #[must_use]
    pub fn configure_flags(&self) -> Vec<String> {
        self.disabled_names()
            .iter()
            .map(|name| format!("--disable-{name}"))
            .chain(
                self.enabled_names()
                    .iter()
                    .map(|name| format!("--enable-{name}")),
            )
            .collect()
    }

    /// Features that must be compiled in.
    #[must_use]
    pub fn effective_set(&self) -> Vec<String> {
        self.enabled_names()
    }

    /// Features that must be absent: disabled and not re-enabled.
    #[must_use]
    pub fn expected_disabled(&self) -> Vec<String> {
        let enabled = self.enabled_names();
        self.disabled_names()
            .into_iter()
            .filter(|name| !enabled.contains(name))
            .collect()
    }

    /// Returns a copy whose enabled list also carries `extra`, after the
    /// caller's names.
    #[must_use]
    pub fn with_appended(&self, extra: &[&str]) -> Self {
        if extra.is_empty() {
            return self.clone();
        }
        let mut names = self.enabled_names();
        for name in extra {
            if !names.iter().any(|existing| existing == name) {
                names.push((*name).to_owned());
            }
        }
        Self {
            disabled: self.disabled.clone(),
            enabled: FeatureList::Names(names),
        }
    }
}

#[cfg(test)]
#[path = "features_tests.rs"]
mod tests;
