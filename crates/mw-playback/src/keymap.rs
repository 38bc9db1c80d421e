//! Logical to native key-name translation
//!
//! Recorded and persisted actions carry logical input names as the capture
//! layer reports them ("ArrowUp", "Enter", " "). The injector wants its own
//! native symbols. This table is part of the playback contract: the same
//! logical names appear in capability-derived recordings and in persisted
//! records, so both must translate identically. Unmapped names pass through
//! lower-cased.

/// Translate a logical input name to the injector's native symbol
pub fn native_key(logical: &str) -> String {
    let mapped = match logical {
        "ArrowUp" | "Up" => "up",
        "ArrowDown" | "Down" => "down",
        "ArrowLeft" | "Left" => "left",
        "ArrowRight" | "Right" => "right",
        "Enter" | "Return" => "enter",
        "Escape" | "Esc" => "escape",
        " " | "Space" | "Spacebar" => "space",
        "Control" | "Ctrl" => "ctrl",
        "Shift" => "shift",
        "Alt" | "Option" => "alt",
        "Meta" | "Command" | "Super" | "Windows" => "meta",
        "Backspace" => "backspace",
        "Tab" => "tab",
        "Delete" | "Del" => "delete",
        "Insert" => "insert",
        "Home" => "home",
        "End" => "end",
        "PageUp" => "pageup",
        "PageDown" => "pagedown",
        "CapsLock" => "capslock",
        "PrintScreen" => "printscreen",
        other => return other.to_lowercase(),
    };
    mapped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_and_editing_keys_map_to_native_symbols() {
        assert_eq!(native_key("ArrowUp"), "up");
        assert_eq!(native_key("ArrowLeft"), "left");
        assert_eq!(native_key("Enter"), "enter");
        assert_eq!(native_key("Backspace"), "backspace");
        assert_eq!(native_key(" "), "space");
    }

    #[test]
    fn modifier_aliases_collapse() {
        assert_eq!(native_key("Control"), "ctrl");
        assert_eq!(native_key("Ctrl"), "ctrl");
        assert_eq!(native_key("Command"), "meta");
        assert_eq!(native_key("Windows"), "meta");
    }

    #[test]
    fn unmapped_names_pass_through_lowercased() {
        assert_eq!(native_key("F5"), "f5");
        assert_eq!(native_key("KeyA"), "keya");
        assert_eq!(native_key("q"), "q");
    }
}
