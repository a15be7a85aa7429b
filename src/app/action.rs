/// What the main loop should do after handling one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Continue,
    Connect,
    Disconnect,
    Quit,
}
