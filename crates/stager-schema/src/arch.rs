//! CPU architecture identification and package compatibility.
//!
//! The architecture a package declares is matched against the machine's
//! *hardware* architecture (never the emulated one), so an installer running
//! under x64 emulation on an ARM64 host still refuses a package the silicon
//! cannot run natively or through a supported translation layer.

/// A CPU architecture a package can declare or a machine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 32-bit x86.
    X86,
    /// 64-bit x86 (`x86_64` / amd64).
    X64,
    /// 64-bit ARM (`aarch64`).
    Arm64,
}

impl Arch {
    /// String representation as used in package manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        }
    }

    /// Compile-time architecture of this binary.
    ///
    /// This is the architecture the binary was built for, which on an
    /// emulating host differs from the hardware architecture; callers that
    /// need the hardware truth go through the platform layer instead.
    pub fn compiled() -> Self {
        #[cfg(target_arch = "x86")]
        {
            Self::X86
        }
        #[cfg(target_arch = "aarch64")]
        {
            Self::Arm64
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "aarch64")))]
        {
            Self::X64
        }
    }

    /// Whether a machine of this architecture can run a package built for
    /// `package`.
    ///
    /// `x64_emulation` reports whether the running OS can translate x64
    /// binaries on an ARM64 host; it is ignored for other hosts.
    pub fn runs_package(self, package: Arch, x64_emulation: bool) -> bool {
        match self {
            Self::X86 => package == Self::X86,
            Self::X64 => matches!(package, Self::X86 | Self::X64),
            Self::Arm64 => match package {
                Self::X86 | Self::Arm64 => true,
                Self::X64 => x64_emulation,
            },
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x86" | "i386" => Ok(Self::X86),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
