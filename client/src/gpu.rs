use std::process::Command;

const GEFORCE_PREFIX: &str = "NVIDIA GeForce ";

/// Display name of the compute device, resolved once at startup. Tries
/// `nvidia-smi` first, then the PCI listing; never fails.
pub fn model() -> String {
    nvidia_smi().or_else(lspci).unwrap_or_else(|| "Unknown GPU".to_string())
}

fn nvidia_smi() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    first_line(&output.stdout).map(strip_vendor)
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        fn lspci() -> Option<String> {
            None
        }
    } else {
        fn lspci() -> Option<String> {
            let output = Command::new("sh")
                .args(["-c", "lspci | grep -i 'vga\\|3d\\|2d'"])
                .output()
                .ok()?;
            first_line(&output.stdout).map(strip_vendor)
        }
    }
}

fn first_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.to_string())
}

fn strip_vendor(name: String) -> String {
    name.replace(GEFORCE_PREFIX, "")
}
