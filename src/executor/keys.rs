/// Android keycode for HOME, also used for any key name not in the table.
pub const KEYCODE_HOME: &str = "3";
pub const KEYCODE_BACK: &str = "4";
pub const KEYCODE_ENTER: &str = "66";

/// Resolves a symbolic key name, case-insensitively.
///
/// Unknown names fall back to HOME rather than failing the step.
pub fn keycode_for(name: &str) -> &'static str {
    match name.trim().to_ascii_lowercase().as_str() {
        "home" => KEYCODE_HOME,
        "back" => KEYCODE_BACK,
        "enter" => KEYCODE_ENTER,
        other => {
            tracing::warn!(key = other, "unknown key name, falling back to HOME");
            KEYCODE_HOME
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_any_case() {
        assert_eq!(keycode_for("home"), "3");
        assert_eq!(keycode_for("BACK"), "4");
        assert_eq!(keycode_for("Enter"), "66");
    }

    #[test]
    fn unknown_key_is_home() {
        assert_eq!(keycode_for("volup"), "3");
        assert_eq!(keycode_for(""), "3");
    }
}
