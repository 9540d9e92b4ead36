// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operating system and package manager detection.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Operating system family of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    MacOs,
    Linux,
    Other(String),
}

impl OsFamily {
    /// Interpret `uname -s` output.
    pub fn from_uname(uname: &str) -> Self {
        match uname.trim().to_ascii_lowercase().as_str() {
            "darwin" => Self::MacOs,
            "linux" => Self::Linux,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for OsFamily {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MacOs => fmt.write_str("macOS"),
            Self::Linux => fmt.write_str("Linux"),
            Self::Other(name) => fmt.write_str(name),
        }
    }
}

/// Package managers unisync knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Homebrew,
    Apt,
    Dnf,
    Zypper,
    Pacman,
    Apk,
    Xbps,
    Portage,
    Nix,
}

impl PackageManager {
    /// Determine package manager for a host.
    ///
    /// Linux distributions are matched by their os-release `ID` first, then by
    /// every entry of `ID_LIKE`.
    pub fn detect(
        os: &OsFamily,
        distro_id: Option<&str>,
        distro_like: Option<&str>,
    ) -> Option<Self> {
        match os {
            OsFamily::MacOs => Some(Self::Homebrew),
            OsFamily::Linux => {
                let like = distro_like.unwrap_or_default().split_whitespace();
                distro_id.into_iter().chain(like).find_map(Self::for_distro)
            }
            OsFamily::Other(_) => None,
        }
    }

    /// Map a single os-release identifier to its package manager.
    pub fn for_distro(id: &str) -> Option<Self> {
        let id = id.trim().trim_matches('"').to_ascii_lowercase();
        let manager = match id.as_str() {
            "debian" | "ubuntu" | "linuxmint" | "pop" | "raspbian" | "kali" | "elementary"
            | "zorin" => Self::Apt,
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "ol" | "amzn" => Self::Dnf,
            "sles" | "suse" => Self::Zypper,
            id if id.starts_with("opensuse") => Self::Zypper,
            "arch" | "manjaro" | "endeavouros" | "garuda" | "artix" => Self::Pacman,
            "alpine" => Self::Apk,
            "void" => Self::Xbps,
            "gentoo" => Self::Portage,
            "nixos" => Self::Nix,
            _ => return None,
        };

        Some(manager)
    }

    /// Binary whose presence means the package manager is installed.
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Homebrew => "brew",
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Zypper => "zypper",
            Self::Pacman => "pacman",
            Self::Apk => "apk",
            Self::Xbps => "xbps-install",
            Self::Portage => "emerge",
            Self::Nix => "nix-env",
        }
    }

    /// Shell command installing unison.
    pub fn install_unison(&self) -> &'static str {
        match self {
            Self::Homebrew => "brew install unison",
            Self::Apt => "sudo apt-get update && sudo apt-get install -y unison",
            Self::Dnf => "sudo dnf install -y unison",
            Self::Zypper => "sudo zypper --non-interactive install unison",
            Self::Pacman => "sudo pacman -S --noconfirm unison",
            Self::Apk => "sudo apk add unison",
            Self::Xbps => "sudo xbps-install -y unison",
            Self::Portage => "sudo emerge --ask=n net-misc/unison",
            Self::Nix => "nix-env -iA nixos.unison",
        }
    }

    /// Shell command installing the package manager itself.
    ///
    /// Only Homebrew can be installed after the fact.
    pub fn bootstrap_command(&self) -> Option<&'static str> {
        match self {
            Self::Homebrew => Some(
                "NONINTERACTIVE=1 /bin/bash -c \"$(curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)\"",
            ),
            _ => None,
        }
    }

    /// Every binary name that may need probing.
    pub fn all_binaries() -> impl Iterator<Item = &'static str> {
        [
            Self::Homebrew,
            Self::Apt,
            Self::Dnf,
            Self::Zypper,
            Self::Pacman,
            Self::Apk,
            Self::Xbps,
            Self::Portage,
            Self::Nix,
        ]
        .into_iter()
        .map(|manager| manager.binary())
    }
}

impl Display for PackageManager {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Homebrew => fmt.write_str("Homebrew"),
            Self::Apt => fmt.write_str("apt"),
            Self::Dnf => fmt.write_str("dnf"),
            Self::Zypper => fmt.write_str("zypper"),
            Self::Pacman => fmt.write_str("pacman"),
            Self::Apk => fmt.write_str("apk"),
            Self::Xbps => fmt.write_str("xbps"),
            Self::Portage => fmt.write_str("portage"),
            Self::Nix => fmt.write_str("nix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("ubuntu", None, Some(PackageManager::Apt); "ubuntu")]
    #[test_case("\"rocky\"", None, Some(PackageManager::Dnf); "quoted rocky")]
    #[test_case("opensuse-tumbleweed", None, Some(PackageManager::Zypper); "tumbleweed")]
    #[test_case("manjaro", None, Some(PackageManager::Pacman); "manjaro")]
    #[test_case("alpine", None, Some(PackageManager::Apk); "alpine")]
    #[test_case("void", None, Some(PackageManager::Xbps); "void")]
    #[test_case("gentoo", None, Some(PackageManager::Portage); "gentoo")]
    #[test_case("nixos", None, Some(PackageManager::Nix); "nixos")]
    #[test_case("neon", Some("ubuntu debian"), Some(PackageManager::Apt); "id like fallback")]
    #[test_case("plan9", Some("unknown"), None; "unsupported")]
    #[test]
    fn linux_distro_mapping(id: &str, like: Option<&str>, expect: Option<PackageManager>) {
        let result = PackageManager::detect(&OsFamily::Linux, Some(id), like);
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn macos_uses_homebrew() {
        let os = OsFamily::from_uname("Darwin\n");
        assert_eq!(os, OsFamily::MacOs);
        assert_eq!(PackageManager::detect(&os, None, None), Some(PackageManager::Homebrew));
        assert_eq!(PackageManager::detect(&OsFamily::from_uname("FreeBSD"), None, None), None);
    }
}
