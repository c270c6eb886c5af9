//! Host package installation

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ProvisionError, Result};
use crate::infrastructure::process;

const INSTALL_ATTEMPTS: u32 = 3;
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Package manager family of the host, detected once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManager {
    Debian,
    Rhel { tool: String },
}

impl PackageManager {
    pub async fn detect() -> Result<Self> {
        let os_release = tokio::fs::read_to_string("/etc/os-release").await?;
        let has_dnf = Path::new("/usr/bin/dnf").exists();
        Self::from_os_release(&os_release, has_dnf)
    }

    /// Classify from the `ID` and `ID_LIKE` entries of os-release
    pub fn from_os_release(contents: &str, has_dnf: bool) -> Result<Self> {
        let mut ids = Vec::new();
        for line in contents.lines() {
            if let Some(value) = line
                .strip_prefix("ID=")
                .or_else(|| line.strip_prefix("ID_LIKE="))
            {
                ids.extend(
                    value
                        .trim_matches('"')
                        .split_whitespace()
                        .map(str::to_lowercase),
                );
            }
        }

        let is = |name: &str| ids.iter().any(|id| id == name);
        if is("debian") || is("ubuntu") {
            Ok(PackageManager::Debian)
        } else if is("rhel") || is("fedora") || is("centos") || is("rocky") {
            let tool = if has_dnf { "dnf" } else { "yum" };
            Ok(PackageManager::Rhel { tool: tool.to_string() })
        } else {
            Err(ProvisionError::PackageInstall(format!(
                "unsupported operating system (ids: {})",
                ids.join(" ")
            )))
        }
    }

    fn query_command(&self, package: &str) -> (PathBuf, Vec<String>) {
        match self {
            PackageManager::Debian => (
                PathBuf::from("dpkg-query"),
                vec!["-W".into(), "--showformat=${Status}".into(), package.into()],
            ),
            PackageManager::Rhel { .. } => (PathBuf::from("rpm"), vec!["-q".into(), package.into()]),
        }
    }

    fn install_command(&self, package: &str) -> (PathBuf, Vec<String>) {
        match self {
            PackageManager::Debian => (
                PathBuf::from("apt-get"),
                vec!["install".into(), "-y".into(), package.into()],
            ),
            PackageManager::Rhel { tool } => (
                PathBuf::from(tool),
                vec!["install".into(), "-y".into(), package.into()],
            ),
        }
    }

    async fn is_installed(&self, package: &str) -> bool {
        let (program, args) = self.query_command(package);
        match process::run(&program, &args, None, Duration::from_secs(30)).await {
            Ok(output) => {
                output.success()
                    && (matches!(self, PackageManager::Rhel { .. })
                        || output.stdout.contains("install ok installed"))
            }
            Err(_) => false,
        }
    }

    /// Install each missing package, retrying failed installs
    pub async fn ensure_installed(&self, packages: &[String], retry_delay: Duration) -> Result<()> {
        for package in packages {
            if self.is_installed(package).await {
                info!("📦 {} exists", package);
                continue;
            }

            let (program, args) = self.install_command(package);
            let mut last_error = String::new();
            let mut installed = false;

            for attempt in 1..=INSTALL_ATTEMPTS {
                info!("📦 Installing {} (attempt {}/{})", package, attempt, INSTALL_ATTEMPTS);
                match process::run(&program, &args, None, INSTALL_TIMEOUT).await {
                    Ok(output) if output.success() => {
                        installed = true;
                        break;
                    }
                    Ok(output) => last_error = output.stderr.trim().to_string(),
                    Err(e) => last_error = e.to_string(),
                }
                warn!("Installing {} failed: {}", package, last_error);
                if attempt < INSTALL_ATTEMPTS {
                    tokio::time::sleep(retry_delay).await;
                }
            }

            if !installed {
                return Err(ProvisionError::PackageInstall(format!(
                    "{}: {}",
                    package, last_error
                )));
            }
        }
        Ok(())
    }
}
