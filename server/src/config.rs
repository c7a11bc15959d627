/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Interval between WebSocket pings on each connection (seconds).
    pub ping_interval_secs: u64,
    /// Capacity of the command channel feeding the relay actor.
    pub command_buffer: usize,
    /// Capacity of the fan-out broadcast channel.
    pub broadcast_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            ping_interval_secs: 30,
            command_buffer: 256,
            broadcast_buffer: 256,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.ping_interval_secs == 0 {
            return Err("ping_interval_secs must be > 0".to_string());
        }
        if self.command_buffer == 0 {
            return Err("command_buffer must be > 0".to_string());
        }
        if self.broadcast_buffer == 0 {
            return Err("broadcast_buffer must be > 0".to_string());
        }
        Ok(())
    }
}
