// src/packages/shell.rs

//! Secondary inventory source: the out-of-process package listing
//!
//! Runs the package manager's command-line listing, which also reports
//! packages the registry API hides. Two invocations are made, the full
//! listing and the special-component partition, and both are started
//! before either is read so they run concurrently.

use super::InventorySource;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

const LINE_PREFIX: &str = "package:";

/// One line of listing output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPackage {
    pub package_name: String,
    /// Base package path, absent when the line carried only the identifier
    pub path: Option<String>,
}

/// Parse a listing line
///
/// Accepts `package:<path>=<identifier>` and `package:<identifier>`. The
/// identifier is whatever follows the last `=`, since paths may contain
/// `=` themselves; an identifier containing `/` means the line was not in
/// the expected shape and it is rejected.
pub fn parse_shell_package(line: &str) -> Option<ShellPackage> {
    let rest = line.trim_end().strip_prefix(LINE_PREFIX)?;

    let (path, name) = match rest.rfind('=') {
        None => (None, rest),
        Some(idx) => (Some(&rest[..idx]), &rest[idx + 1..]),
    };

    if name.is_empty() || name.contains('/') {
        return None;
    }

    Some(ShellPackage {
        package_name: name.to_string(),
        path: path.filter(|p| !p.is_empty()).map(str::to_string),
    })
}

pub struct ShellListingSource {
    command: Vec<String>,
    special_args: Vec<String>,
    timeout: Duration,
}

impl ShellListingSource {
    /// `command` is the program followed by its arguments
    pub fn new(command: Vec<String>, special_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command,
            special_args,
            timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.listing_command.clone(),
            config.special_listing_args.clone(),
            config.process_timeout(),
        )
    }

    fn spawn(&self, extra_args: &[String]) -> Result<Child> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::SourceUnavailable("empty listing command".to_string()))?;

        Command::new(program)
            .args(args)
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::SourceUnavailable(format!("Failed to run {program}: {e}")))
    }

    /// Wait for one invocation and parse its output
    ///
    /// Any failure yields an empty contribution.
    async fn collect(&self, label: &str, child: Result<Child>) -> Vec<ShellPackage> {
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("{} listing skipped: {}", label, e);
                return Vec::new();
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let err = Error::SourceUnavailable(format!("{label} listing failed: {e}"));
                warn!("{}", err);
                return Vec::new();
            }
            Err(_) => {
                let err = Error::SourceUnavailable(format!(
                    "{label} listing timed out after {:?}",
                    self.timeout
                ));
                warn!("{}", err);
                return Vec::new();
            }
        };

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            if !line.trim().is_empty() {
                warn!("{} listing: {}", label, line);
            }
        }
        if !output.status.success() {
            warn!("{} listing exited with {}", label, output.status);
        }

        let packages: Vec<ShellPackage> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_shell_package)
            .collect();
        debug!("{} listing produced {} packages", label, packages.len());
        packages
    }
}

#[async_trait]
impl InventorySource for ShellListingSource {
    type Item = ShellPackage;

    async fn fetch(&self) -> Result<Vec<ShellPackage>> {
        // Start both processes before reading either
        let full = self.spawn(&[]);
        let special = (!self.special_args.is_empty()).then(|| self.spawn(&self.special_args));

        let (mut packages, special) = tokio::join!(self.collect("full", full), async {
            match special {
                Some(child) => self.collect("special", child).await,
                None => Vec::new(),
            }
        });

        packages.extend(special);

        let mut seen = HashSet::new();
        packages.retain(|p| seen.insert(p.package_name.clone()));
        Ok(packages)
    }

    fn name(&self) -> &str {
        "shell"
    }
}
