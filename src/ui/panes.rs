/// Which part of the main view receives key input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Focus {
    /// Search input at the top
    #[default]
    Search,
    /// Card grid
    Grid,
}

impl Focus {
    pub fn title(self) -> &'static str {
        match self {
            Focus::Search => "SEARCH",
            Focus::Grid => "COUNTRIES",
        }
    }
}
