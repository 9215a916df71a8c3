use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub max_segment_size: usize,
    pub window_size: u64,
    pub ack_timeout: Duration,
    pub retry_cap: u32,
}

impl Default for Config {
    fn default() -> Self {
        let max_segment_size = 1500;
        Config {
            max_segment_size,
            window_size: 12 * max_segment_size as u64,
            ack_timeout: Duration::from_millis(10),
            retry_cap: 20,
        }
    }
}
