pub struct AppConfig {
    pub bpm: f64,
    pub block_size: usize,
    /// Loop lengths of silence rendered after the input runs out.
    pub extra_loops: usize,
}

impl AppConfig {
    pub fn new(bpm: f64, block_size: usize) -> Self {
        AppConfig { bpm, block_size, extra_loops: 0 }
    }

    /// Settings for the single looper instance the CLI runs. There are no
    /// sibling instances to sync with.
    pub fn looper_config(self: &Self, sample_rate: f64) -> looper::Config {
        looper::Config {
            sample_rate,
            default_bpm: self.bpm,
            sync_group: None,
            ..looper::Config::default()
        }
    }
}
