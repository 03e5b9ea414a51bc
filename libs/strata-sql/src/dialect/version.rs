// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::database_error::DatabaseError;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").unwrap());

/// A server's `major.minor.patch` version, compared component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first version number in a vendor's version banner, such as `3.45.1`,
    /// `16.2 (Debian 16.2-1.pgdg120+2)` or `8.0.36-0ubuntu0.22.04.1`.
    pub fn parse(banner: &str) -> Result<Self, DatabaseError> {
        let captures = VERSION_RE.captures(banner).ok_or_else(|| {
            DatabaseError::Config(format!("Unrecognized server version '{banner}'"))
        })?;

        let component = |index: usize| -> Result<u32, DatabaseError> {
            captures
                .get(index)
                .map(|m| m.as_str().parse::<u32>())
                .transpose()
                .map(|v| v.unwrap_or(0))
                .map_err(|_| {
                    DatabaseError::Config(format!("Unrecognized server version '{banner}'"))
                })
        };

        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }
}

impl Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_banners() {
        assert_eq!(
            ServerVersion::parse("3.45.1").unwrap(),
            ServerVersion::new(3, 45, 1)
        );
        assert_eq!(
            ServerVersion::parse("16.2 (Debian 16.2-1.pgdg120+2)").unwrap(),
            ServerVersion::new(16, 2, 0)
        );
        assert_eq!(
            ServerVersion::parse("8.0.36-0ubuntu0.22.04.1").unwrap(),
            ServerVersion::new(8, 0, 36)
        );
        assert!(ServerVersion::parse("unknown").is_err());
    }

    #[test]
    fn ordering_is_component_wise() {
        assert!(ServerVersion::new(3, 35, 0) > ServerVersion::new(3, 9, 9));
        assert!(ServerVersion::new(8, 0, 0) > ServerVersion::new(5, 7, 44));
    }
}
