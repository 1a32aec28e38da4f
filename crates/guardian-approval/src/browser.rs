// browser.rs — Launching the platform browser for an approval URL.
//
// Failures here are never fatal: the terminal block always carries enough
// to approve by hand, so a missing opener just logs and moves on.

use std::process::Command;

/// Environment toggle that forces auto-open on, overriding config.
/// Truthy values: "1", "true" (case-insensitive).
pub const AUTO_OPEN_ENV: &str = "GUARDIAN_AUTO_OPEN";

/// Whether auto-open should run: the env toggle wins when truthy,
/// otherwise the config flag decides.
pub fn auto_open_enabled(config_flag: bool) -> bool {
    match std::env::var(AUTO_OPEN_ENV) {
        Ok(value) => {
            let v = value.trim().to_ascii_lowercase();
            if v == "1" || v == "true" {
                return true;
            }
            config_flag
        }
        Err(_) => config_flag,
    }
}

/// Launch the platform-appropriate opener for `url`.
///
/// - macOS: `open <url>`
/// - Linux: `xdg-open <url>`
/// - Windows: `rundll32 url.dll,FileProtocolHandler <url>`
pub fn open_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let (command, args) = ("open", vec![url]);

    #[cfg(target_os = "linux")]
    let (command, args) = ("xdg-open", vec![url]);

    #[cfg(target_os = "windows")]
    let (command, args) = ("rundll32", vec!["url.dll,FileProtocolHandler", url]);

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    return Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no browser opener for this platform",
    ));

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    {
        Command::new(command).args(args).spawn()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_toggle_forces_on() {
        let prev = std::env::var(AUTO_OPEN_ENV).ok();

        std::env::set_var(AUTO_OPEN_ENV, "1");
        assert!(auto_open_enabled(false));
        std::env::set_var(AUTO_OPEN_ENV, "true");
        assert!(auto_open_enabled(false));

        // Non-truthy values defer to config.
        std::env::set_var(AUTO_OPEN_ENV, "0");
        assert!(!auto_open_enabled(false));
        assert!(auto_open_enabled(true));

        match prev {
            Some(v) => std::env::set_var(AUTO_OPEN_ENV, v),
            None => std::env::remove_var(AUTO_OPEN_ENV),
        }
    }
}
