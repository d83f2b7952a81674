//! OpenSSL discovery for Darwin, where there is no system copy to link.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpensslTables {
    /// Header whose presence identifies an OpenSSL installation prefix.
    pub marker: String,
    /// Well-known prefixes, probed in order.
    pub search: Vec<OpensslLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpensslLocation {
    pub name: String,
    pub prefix: PathBuf,
}

fn prefix_flags(prefix: &Path) -> Vec<String> {
    vec![
        format!("-I{}", prefix.join("include").display()),
        format!("-L{}", prefix.join("lib").display()),
    ]
}

/// Include/lib flags for OpenSSL.
///
/// An explicit override must contain the marker header; there is no fallback
/// to the search list when it does not. Without an override the first
/// location whose marker exists wins.
pub fn discover_openssl(override_dir: Option<&Path>, tables: &OpensslTables) -> Result<Vec<String>> {
    if let Some(dir) = override_dir {
        if !dir.join(&tables.marker).is_file() {
            return Err(BuildError::OpensslOverrideMissing {
                path: dir.to_path_buf(),
                marker: tables.marker.clone(),
            });
        }
        tracing::info!("Using OpenSSL at {}", dir.display());
        return Ok(prefix_flags(dir));
    }

    for location in &tables.search {
        if location.prefix.join(&tables.marker).is_file() {
            tracing::info!("Found OpenSSL installed via {}", location.name);
            return Ok(prefix_flags(&location.prefix));
        }
        tracing::debug!(
            "no OpenSSL at {} ({})",
            location.prefix.display(),
            location.name
        );
    }

    Err(BuildError::OpensslNotFound {
        searched: tables
            .search
            .iter()
            .map(|location| location.prefix.display().to_string())
            .collect(),
    })
}
