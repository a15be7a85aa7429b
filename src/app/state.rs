//! What the console needs to remember between events.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub nick: String,
    /// Where plain text goes: the last joined channel or `/query` target.
    pub current_target: Option<String>,
    pub timestamp_format: String,
    pub connected: bool,
}

impl ViewState {
    pub fn new(nick: impl Into<String>, timestamp_format: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            current_target: None,
            timestamp_format: timestamp_format.into(),
            connected: false,
        }
    }

    pub fn set_target(&mut self, target: &str) {
        self.current_target = Some(target.to_string());
    }

    /// Forget the target if it was `name`.
    pub fn clear_target(&mut self, name: &str) {
        if self.current_target.as_deref() == Some(name) {
            self.current_target = None;
        }
    }
}
