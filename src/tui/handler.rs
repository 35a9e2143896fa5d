use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which surface currently owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Library,
    Search,
    ConfirmClear,
    Browse,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    DeleteSelected,
    ClearAllStart,
    ClearAllConfirm,
    ClearAllCancel,
    ToggleViewMode,
    Resummarize,
    OpenSelected,
    OpenBrowse,
    ShowHelp,
    HideHelp,
    // Search input actions
    SearchStart,
    SearchChar(char),
    SearchBackspace,
    SearchConfirm,
    SearchCancel,
    // Browse (overlay) actions
    LinkUp,
    LinkDown,
    TriggerKey(char),
    ToggleTooltipFocus,
    ReloadTooltip,
    OpenLink,
    BackToLibrary,
}

pub fn handle_key_event(key: KeyEvent, mode: InputMode, trigger_key: char) -> Option<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(AppAction::Quit);
    }

    match mode {
        // Any key closes help
        InputMode::Help => Some(AppAction::HideHelp),

        InputMode::Search => match key.code {
            KeyCode::Enter => Some(AppAction::SearchConfirm),
            KeyCode::Esc => Some(AppAction::SearchCancel),
            KeyCode::Backspace => Some(AppAction::SearchBackspace),
            KeyCode::Char(c) => Some(AppAction::SearchChar(c)),
            _ => None,
        },

        InputMode::ConfirmClear => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(AppAction::ClearAllConfirm),
            _ => Some(AppAction::ClearAllCancel),
        },

        InputMode::Browse => match key.code {
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&trigger_key) => {
                Some(AppAction::TriggerKey(c))
            }
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::LinkDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::LinkUp),
            KeyCode::Tab => Some(AppAction::ToggleTooltipFocus),
            KeyCode::Char('r') => Some(AppAction::ReloadTooltip),
            KeyCode::Char('o') => Some(AppAction::OpenLink),
            KeyCode::Esc => Some(AppAction::BackToLibrary),
            KeyCode::Char('?') => Some(AppAction::ShowHelp),
            KeyCode::Char('q') => Some(AppAction::Quit),
            _ => None,
        },

        InputMode::Library => match key.code {
            KeyCode::Char('q') => Some(AppAction::Quit),

            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Char('<') | KeyCode::Home => Some(AppAction::MoveToTop),
            KeyCode::Char('>') | KeyCode::End => Some(AppAction::MoveToBottom),

            KeyCode::Char('/') => Some(AppAction::SearchStart),
            KeyCode::Char('d') => Some(AppAction::DeleteSelected),
            KeyCode::Char('C') => Some(AppAction::ClearAllStart),
            KeyCode::Char('v') => Some(AppAction::ToggleViewMode),
            KeyCode::Char('R') => Some(AppAction::Resummarize),
            KeyCode::Char('o') => Some(AppAction::OpenSelected),
            KeyCode::Char('b') => Some(AppAction::OpenBrowse),

            KeyCode::Char('?') => Some(AppAction::ShowHelp),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn trigger_key_wins_in_browse_mode() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('S')), InputMode::Browse, 's'),
            Some(AppAction::TriggerKey('S'))
        );
        // a trigger key that shadows navigation still triggers
        assert_eq!(
            handle_key_event(press(KeyCode::Char('j')), InputMode::Browse, 'j'),
            Some(AppAction::TriggerKey('j'))
        );
    }

    #[test]
    fn search_mode_captures_characters() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('q')), InputMode::Search, 's'),
            Some(AppAction::SearchChar('q'))
        );
    }

    #[test]
    fn clear_requires_explicit_yes() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('y')), InputMode::ConfirmClear, 's'),
            Some(AppAction::ClearAllConfirm)
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), InputMode::ConfirmClear, 's'),
            Some(AppAction::ClearAllCancel)
        );
    }

    #[test]
    fn ctrl_c_always_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(key, InputMode::Search, 's'), Some(AppAction::Quit));
    }
}
