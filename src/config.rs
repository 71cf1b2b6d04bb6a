use std::{net::SocketAddr, time::Duration};

use clap::{ArgAction, Parser};

use crate::rooms::HubConfig;

/// Room broadcast server. Every flag can also come from the environment or a `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Socket address to listen on.
    #[arg(long, env = "ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Origins allowed by CORS, comma separated.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:4200,https://fir-angular-showcase.web.app"
    )]
    pub allowed_origins: Vec<String>,

    /// Seconds a room lives after creation. 0 keeps rooms until shutdown.
    #[arg(long, env = "ROOM_LIFETIME_SECS", default_value_t = 200)]
    pub room_lifetime: u64,

    /// Messages buffered per client before it is dropped as too slow.
    #[arg(long, env = "CLIENT_BUFFER", default_value_t = 256)]
    pub client_buffer: usize,

    /// Deliver a client's messages back to itself too.
    #[arg(long, env = "ECHO_TO_SENDER", default_value_t = false, action = ArgAction::Set)]
    pub echo_to_sender: bool,

    /// Keep a per-room log of delivered messages.
    #[arg(long, env = "RECORD_HISTORY", default_value_t = true, action = ArgAction::Set)]
    pub record_history: bool,

    /// Most recent messages kept per room; older ones are dropped.
    #[arg(long, env = "HISTORY_LIMIT", default_value_t = 1024)]
    pub history_limit: usize,

    /// Seconds an HTTP request may take before it is answered with 408.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout: u64,
}

impl Config {
    pub fn lifetime(&self) -> Option<Duration> {
        (self.room_lifetime > 0).then(|| Duration::from_secs(self.room_lifetime))
    }

    pub fn hub(&self) -> HubConfig {
        HubConfig {
            client_buffer: self.client_buffer,
            echo_to_sender: self.echo_to_sender,
            record_history: self.record_history,
            history_limit: self.history_limit,
        }
    }
}
