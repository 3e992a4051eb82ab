//! Repository credentials read from a `.netrc` file.
//!
//! The file is a passive data source: a missing or unreadable file yields an
//! empty table and the resolver proceeds without authentication.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the credential file location.
pub const NETRC_ENV: &str = "NETRC";

/// Login details for one machine.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Host name, `None` for the `default` entry.
    pub machine: Option<String>,
    /// User name.
    pub login: Option<String>,
    /// Password or token.
    pub password: Option<String>,
    /// Additional account string.
    pub account: Option<String>,
}

impl Credential {
    /// Whether the credential carries nothing usable for authentication.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.login.is_none() && self.password.is_none()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("account", &self.account)
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.machine.as_deref().unwrap_or("default");
        let login = self.login.as_deref().unwrap_or("");
        if self.password.is_some() {
            write!(f, "{login}:****@{machine}")
        } else {
            write!(f, "{login}@{machine}")
        }
    }
}

/// Source of per-host credentials.
pub trait CredentialSource: Send + Sync {
    /// Credential to use for `host`, if any.
    fn credential_for(&self, host: &str) -> Option<Credential>;
}

/// Parsed `.netrc` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    machines: BTreeMap<String, Credential>,
    default: Option<Credential>,
}

impl Netrc {
    /// Empty table: no host has credentials.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse `.netrc` content.
    ///
    /// Unknown tokens are skipped; `macdef` bodies run to the next blank line.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut netrc = Self::default();
        let mut current: Option<Credential> = None;
        let mut in_macdef = false;

        for line in content.lines() {
            if in_macdef {
                if line.trim().is_empty() {
                    in_macdef = false;
                }
                continue;
            }
            let line = line.split('#').next().unwrap_or("");
            let mut tokens = tokenize(line).into_iter();
            while let Some(token) = tokens.next() {
                match token.as_str() {
                    "machine" => {
                        netrc.finish(current.take());
                        current = Some(Credential {
                            machine: tokens.next(),
                            ..Credential::default()
                        });
                    }
                    "default" => {
                        netrc.finish(current.take());
                        current = Some(Credential::default());
                    }
                    "login" => {
                        if let Some(entry) = current.as_mut() {
                            entry.login = tokens.next();
                        }
                    }
                    "password" => {
                        if let Some(entry) = current.as_mut() {
                            entry.password = tokens.next();
                        }
                    }
                    "account" => {
                        if let Some(entry) = current.as_mut() {
                            entry.account = tokens.next();
                        }
                    }
                    "macdef" => {
                        in_macdef = true;
                        break;
                    }
                    _ => {}
                }
            }
        }
        netrc.finish(current);
        netrc
    }

    fn finish(&mut self, entry: Option<Credential>) {
        let Some(entry) = entry else { return };
        match entry.machine.clone() {
            Some(machine) => {
                // First entry for a machine wins, as with most netrc consumers.
                self.machines.entry(machine).or_insert(entry);
            }
            None => {
                if self.default.is_none() {
                    self.default = Some(entry);
                }
            }
        }
    }

    /// Load the user's credential file.
    ///
    /// Uses `$NETRC` when set, otherwise `~/.netrc`. Never fails: a missing or
    /// unreadable file gives an empty table.
    #[must_use]
    pub fn from_user_file() -> Self {
        match user_netrc_path() {
            Some(path) => Self::from_file(&path),
            None => Self::empty(),
        }
    }

    /// Load a credential file, falling back to an empty table on any error.
    #[must_use]
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let netrc = Self::parse(&content);
                if netrc.is_empty() {
                    debug!(path = %path.display(), "Netrc file has no entries");
                }
                netrc
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No usable netrc file, continuing without credentials");
                Self::empty()
            }
        }
    }

    /// Credential for `host`: exact match first, then the default entry.
    #[must_use]
    pub fn lookup(&self, host: &str) -> Option<&Credential> {
        self.machines.get(host).or(self.default.as_ref())
    }

    /// Whether the table has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty() && self.default.is_none()
    }
}

impl CredentialSource for Netrc {
    fn credential_for(&self, host: &str) -> Option<Credential> {
        self.lookup(host).filter(|c| !c.is_empty()).cloned()
    }
}

fn user_netrc_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(NETRC_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".netrc"))
}

/// Split on whitespace, honoring double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}
