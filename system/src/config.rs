use std::time::Duration;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "red", "blue", "green", "purple", "orange", "pink", "cyan", "yellow", "indigo", "teal",
];

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Colors handed out round-robin by arrival order. Must not be empty.
    pub palette: Vec<String>,
    /// Period of the per-connection push loop.
    pub tick_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl HubConfig {
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_palette<I, S>(mut self, palette: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let palette: Vec<String> = palette.into_iter().map(Into::into).collect();
        if palette.is_empty() {
            log::warn!("ignoring empty palette, keeping {} colors", self.palette.len());
        } else {
            self.palette = palette;
        }
        self
    }
}
