// gitbridge: unified Git client over the git CLI and libgit2 engines
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Value types shared by the capability interface and the wire protocol.
//!
//! Everything here derives serde so it can cross an execution channel
//! unchanged; the repository handle is deliberately absent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A git object id as a hex string.
///
/// Kept as text rather than `git2::Oid` so ids produced by either engine
/// (or relayed over a channel) compare and serialize uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<git2::Oid> for ObjectId {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// A named ref paired with the commit it ultimately points at.
///
/// For tags the id is always the tagged commit, whether the tag is
/// lightweight or annotated, loose or packed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub name: String,
    pub sha1: ObjectId,
}

/// An author or committer identity. Name and email always travel as a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

/// A username credential. Storage mechanics live outside this crate;
/// engines consult the installed credential during network operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

/// Network proxy descriptor. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub secret: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL in the form the engines hand to git / libgit2.
    #[must_use]
    pub fn url(&self) -> String {
        match (&self.username, &self.secret) {
            (Some(user), Some(secret)) => {
                format!("http://{user}:{secret}@{}:{}", self.host, self.port)
            }
            (Some(user), None) => format!("http://{user}@{}:{}", self.host, self.port),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// Where a repository-scoped callback executes.
///
/// Repository handles never cross an execution channel, so a callback
/// always runs next to the real engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Local,
}
