//! Brings a session's terminal to the front

/// `$ITERM_SESSION_ID` looks like `w0t0p0:GUID`, AppleScript knows the GUID
pub fn terminal_guid(terminal: &str) -> &str {
    terminal.rsplit_once(':').map_or(terminal, |(_, guid)| guid)
}

#[cfg(target_os = "macos")]
pub fn focus_terminal(terminal: &str) -> anyhow::Result<()> {
    use std::process::{Command, Stdio};

    let guid = terminal_guid(terminal);
    let script = format!(
        r#"tell application "iTerm2"
    activate
    repeat with w in windows
        if miniaturized of w then set miniaturized of w to false
        repeat with t in tabs of w
            repeat with s in sessions of t
                if unique ID of s is "{guid}" then
                    select t
                    return
                end if
            end repeat
        end repeat
    end repeat
end tell"#
    );
    // Fire and forget, the daemon loop must not wait on AppleScript
    Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub fn focus_terminal(terminal: &str) -> anyhow::Result<()> {
    log::info!("focus requested for terminal {terminal}, not supported on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_extraction() {
        assert_eq!(terminal_guid("w0t0p0:ABC-123"), "ABC-123");
        assert_eq!(terminal_guid("ABC-123"), "ABC-123");
    }
}
