// Process-wide SIMD kernel selection, detected once and read-only afterwards.
use std::ffi::CStr;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Implementation {
    name: &'static CStr,
    description: &'static CStr,
}

impl Implementation {
    #[cfg(target_arch = "x86_64")]
    const AVX2: Self = Self {
        name: c"avx2",
        description: c"Intel/AMD AVX2 with PCLMULQDQ",
    };
    #[cfg(target_arch = "x86_64")]
    const SSE42: Self = Self {
        name: c"sse4.2",
        description: c"Intel/AMD SSE4.2 with PCLMULQDQ",
    };
    #[cfg(target_arch = "aarch64")]
    const NEON: Self = Self {
        name: c"neon",
        description: c"ARM NEON (64-bit)",
    };
    #[cfg(all(target_arch = "wasm32", target_feature = "simd128"))]
    const SIMD128: Self = Self {
        name: c"simd128",
        description: c"WebAssembly 128-bit SIMD",
    };
    #[cfg(not(any(
        target_arch = "aarch64",
        all(target_arch = "wasm32", target_feature = "simd128")
    )))]
    const FALLBACK: Self = Self {
        name: c"fallback",
        description: c"Generic fallback implementation",
    };

    pub fn name(&self) -> &'static CStr {
        self.name
    }

    pub fn description(&self) -> &'static CStr {
        self.description
    }
}

pub fn active() -> &'static Implementation {
    static ACTIVE: OnceLock<Implementation> = OnceLock::new();
    ACTIVE.get_or_init(|| {
        let detected = detect();
        tracing::debug!(implementation = ?detected.name, "active implementation selected");
        detected
    })
}

#[cfg(target_arch = "x86_64")]
fn detect() -> Implementation {
    if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("pclmulqdq") {
        Implementation::AVX2
    } else if is_x86_feature_detected!("sse4.2") && is_x86_feature_detected!("pclmulqdq") {
        Implementation::SSE42
    } else {
        Implementation::FALLBACK
    }
}

#[cfg(target_arch = "aarch64")]
fn detect() -> Implementation {
    Implementation::NEON
}

#[cfg(all(target_arch = "wasm32", target_feature = "simd128"))]
fn detect() -> Implementation {
    Implementation::SIMD128
}

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "wasm32", target_feature = "simd128")
)))]
fn detect() -> Implementation {
    Implementation::FALLBACK
}
