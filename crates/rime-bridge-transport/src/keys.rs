//! Terminal key events to engine key-sequence syntax.
//!
//! Every key is sent braced, as `{Name}` or `{Modifier+Name}`. Punctuation
//! uses its X keysym name so braces never appear inside a key.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode};

/// Engine key name of a printable ASCII character.
#[must_use]
pub fn char_name(c: char) -> Option<&'static str> {
    let name = match c {
        ' ' => "space",
        '~' => "asciitilde",
        '`' => "quoteleft",
        '!' => "exclam",
        '@' => "at",
        '#' => "numbersign",
        '$' => "dollar",
        '%' => "percent",
        '^' => "asciicircum",
        '&' => "ampersand",
        '*' => "asterisk",
        '(' => "parenleft",
        ')' => "parenright",
        '-' => "minus",
        '_' => "underscore",
        '+' => "plus",
        '=' => "equal",
        '{' => "braceleft",
        '[' => "bracketleft",
        '}' => "braceright",
        ']' => "bracketright",
        ':' => "colon",
        ';' => "semicolon",
        '"' => "quotedbl",
        '\'' => "apostrophe",
        '|' => "bar",
        '\\' => "backslash",
        '<' => "less",
        ',' => "comma",
        '>' => "greater",
        '.' => "period",
        '?' => "question",
        '/' => "slash",
        _ => return None,
    };
    Some(name)
}

fn named_key(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Esc => "Escape",
        KeyCode::Backspace => "BackSpace",
        KeyCode::Delete => "Delete",
        KeyCode::Tab => "Tab",
        KeyCode::BackTab => "ISO_Left_Tab",
        KeyCode::Enter => "Return",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "Page_Up",
        KeyCode::PageDown => "Page_Down",
        KeyCode::Up => "Up",
        KeyCode::Right => "Right",
        KeyCode::Down => "Down",
        KeyCode::Left => "Left",
        KeyCode::Insert => "Insert",
        KeyCode::F(n) if (1..=12).contains(&n) => return Some(format!("F{n}")),
        KeyCode::Char(c) => {
            return Some(char_name(c).map_or_else(|| c.to_string(), str::to_string));
        }
        KeyCode::Modifier(modifier) => modifier_name(modifier),
        _ => return None,
    };
    Some(name.to_string())
}

const fn modifier_name(modifier: ModifierKeyCode) -> &'static str {
    match modifier {
        ModifierKeyCode::LeftShift => "Shift_L",
        ModifierKeyCode::RightShift => "Shift_R",
        ModifierKeyCode::LeftControl => "Control_L",
        ModifierKeyCode::RightControl => "Control_R",
        ModifierKeyCode::LeftAlt => "Alt_L",
        ModifierKeyCode::RightAlt => "Alt_R",
        ModifierKeyCode::LeftMeta | ModifierKeyCode::LeftSuper => "Meta_L",
        ModifierKeyCode::RightMeta | ModifierKeyCode::RightSuper => "Meta_R",
        _ => "ISO_Level3_Shift",
    }
}

// A modifier key reports its own name, not a prefix for itself.
fn modifier_prefix(modifiers: KeyModifiers, code: KeyCode) -> String {
    let own = match code {
        KeyCode::Modifier(ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift) => {
            KeyModifiers::SHIFT
        }
        KeyCode::Modifier(ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl) => {
            KeyModifiers::CONTROL
        }
        KeyCode::Modifier(ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt) => {
            KeyModifiers::ALT
        }
        KeyCode::Modifier(_) => KeyModifiers::SUPER | KeyModifiers::META,
        _ => KeyModifiers::NONE,
    };
    let modifiers = modifiers.difference(own);

    let mut prefix = String::new();
    for (flag, name) in [
        (KeyModifiers::CONTROL, "Control+"),
        (KeyModifiers::SUPER | KeyModifiers::META, "Meta+"),
        (KeyModifiers::ALT, "Alt+"),
        (KeyModifiers::SHIFT, "Shift+"),
    ] {
        if modifiers.intersects(flag) {
            prefix.push_str(name);
        }
    }
    prefix
}

/// Translate one key event into a braced key sequence such as `{a}`,
/// `{Control+Return}` or `{Release+Shift_L}`. Unmappable keys yield `None`.
#[must_use]
pub fn key_to_sequence(key: &KeyEvent) -> Option<String> {
    let name = named_key(key.code)?;
    let release = if key.kind == KeyEventKind::Release {
        "Release+"
    } else {
        ""
    };
    let prefix = modifier_prefix(key.modifiers, key.code);
    Some(format!("{{{release}{prefix}{name}}}"))
}

/// Translate a terminal event; only key events map to input.
#[must_use]
pub fn event_to_sequence(event: &Event) -> Option<String> {
    match event {
        Event::Key(key) => key_to_sequence(key),
        _ => None,
    }
}
