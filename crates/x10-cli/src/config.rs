//! Command-line flags, the TOML config file and their merge.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use serde::Deserialize;
use x10_core::HouseCode;

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

/// x10-bridge - HTTP gateway to an X10 power-line interface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address for the HTTP API to listen on
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Serial port the bridge is attached to
    #[arg(short, long)]
    pub port: Option<String>,

    /// Hardware backend to drive
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// CM11A-class bridge on a serial port
    Serial,
    /// In-process emulated bridge, no hardware required
    Emulated,
    /// nRF24-class radio transceiver (stub)
    Radio,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Serial => f.write_str("serial"),
            BackendKind::Emulated => f.write_str("emulated"),
            BackendKind::Radio => f.write_str("radio"),
        }
    }
}

/// Configuration file format.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub serial: SerialSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct SerialSection {
    pub port: Option<String>,
    pub monitored_house: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    pub listen: Option<SocketAddr>,
    pub backend: Option<BackendKind>,
}

/// Fully resolved runtime settings.
#[derive(Debug)]
pub struct Settings {
    pub listen: SocketAddr,
    pub port: String,
    pub backend: BackendKind,
    pub monitored_house: HouseCode,
}

impl Settings {
    /// Flags win over the config file, the file over built-in defaults.
    pub fn resolve(args: &Args, file: &ConfigFile) -> anyhow::Result<Self> {
        let listen = args.listen.or(file.http.listen).unwrap_or(DEFAULT_LISTEN);
        let port = args
            .port
            .clone()
            .or_else(|| file.serial.port.clone())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());
        let backend = args
            .backend
            .or(file.http.backend)
            .unwrap_or(BackendKind::Serial);
        let monitored_house = match &file.serial.monitored_house {
            Some(house) => HouseCode::from_str(house)?,
            None => HouseCode::A,
        };
        Ok(Self {
            listen,
            port,
            backend,
            monitored_house,
        })
    }
}
