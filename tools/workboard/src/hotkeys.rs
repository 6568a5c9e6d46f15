#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: char,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Quit,
    SelectNext,
    SelectPrev,
    CompleteSelected,
    ToggleFreeze,
}

pub const DASHBOARD_BINDINGS: [HotkeyBinding; 5] = [
    HotkeyBinding {
        key: 'q',
        action: "quit",
    },
    HotkeyBinding {
        key: 'j',
        action: "next failed",
    },
    HotkeyBinding {
        key: 'k',
        action: "prev failed",
    },
    HotkeyBinding {
        key: 'c',
        action: "complete",
    },
    HotkeyBinding {
        key: 'f',
        action: "freeze toggle",
    },
];

pub fn action_for_key(key: char) -> Option<HotkeyAction> {
    match key {
        'q' => Some(HotkeyAction::Quit),
        'j' => Some(HotkeyAction::SelectNext),
        'k' => Some(HotkeyAction::SelectPrev),
        'c' => Some(HotkeyAction::CompleteSelected),
        'f' => Some(HotkeyAction::ToggleFreeze),
        _ => None,
    }
}

pub fn dashboard_controls_legend() -> String {
    let parts = DASHBOARD_BINDINGS
        .iter()
        .map(|binding| format!("{} {}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("Keys: {}", parts.join("  "))
}
