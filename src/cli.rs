//! Command-line parsing
//!
//! Everything is validated here, before any device or socket is opened.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

use crate::error::TransportError;
use crate::network::serial::{Channel, HardwareAddress};
use crate::network::Port;

/// Usage text printed with `--help` and after argument errors
pub const USAGE: &str = "\
Usage: audio-streamer (-p <PORT> | -r <IP:PORT>) [options]
       audio-streamer -b (-p <CHANNEL> | -r <MAC> [--channel <CHANNEL>]) [options]

Options:
  -h [ --help ]             display this help and exit
  -p [ --player ] arg       start as player listening for recorders [arg = port]
  -r [ --recorder ] arg     start as recorder sending to a player [arg = ip:port]
  -b [ --bluetooth ]        use the wireless serial link; -p takes a channel and
                            -r a hardware address (AA:BB:CC:DD:EE:FF)
  --channel arg             channel the recorder connects to with --bluetooth
  -c [ --config ] arg       configuration file
  -l [ --list-devices ]     list audio devices and exit
";

/// Argument errors, each printed as a one-line diagnostic
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("The option '{0}' requires an argument")]
    MissingValue(String),

    #[error("The option '{0}' cannot be given more than once")]
    Repeated(String),

    #[error("You must specify either '-p [ --player ] port' or '-r [ --recorder ] ip:port' not both")]
    BothModes,

    #[error("You must specify either '-p [ --player ] port' or '-r [ --recorder ] ip:port'")]
    NoMode,

    #[error("Invalid argument. Use format IP:PORT.")]
    InvalidTarget(String),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("--channel is only used by a recorder with --bluetooth")]
    UnexpectedChannel,

    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print usage
    Help,
    /// Print audio devices
    ListDevices { config_path: Option<PathBuf> },
    /// Stream audio
    Run(Options),
}

/// A validated streaming request
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub mode: Mode,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Player(Listen),
    Recorder(Target),
}

/// Where a player listens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    Datagram { port: Port },
    Wireless { channel: Channel },
}

/// Where a recorder sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Datagram { ip: IpAddr, port: Port },
    /// Without a channel the configured default is used
    Wireless { address: HardwareAddress, channel: Option<Channel> },
}

#[derive(Default)]
struct RawArgs {
    help: bool,
    list_devices: bool,
    bluetooth: bool,
    player: Option<String>,
    recorder: Option<String>,
    channel: Option<String>,
    config: Option<String>,
}

/// Parse arguments, excluding the program name
pub fn parse<I, S>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let raw = collect(args.into_iter().map(Into::into))?;

    if raw.help {
        return Ok(Command::Help);
    }

    let config_path = raw.config.map(PathBuf::from);
    if raw.list_devices {
        return Ok(Command::ListDevices { config_path });
    }

    let mode = match (raw.player, raw.recorder) {
        (Some(_), Some(_)) => return Err(CliError::BothModes),
        (None, None) => return Err(CliError::NoMode),
        (Some(value), None) => {
            if raw.channel.is_some() {
                return Err(CliError::UnexpectedChannel);
            }
            let number = parse_number(&value)?;
            let listen = if raw.bluetooth {
                Listen::Wireless {
                    channel: Channel::new(number)?,
                }
            } else {
                Listen::Datagram { port: Port::new(number)? }
            };
            Mode::Player(listen)
        }
        (None, Some(value)) => {
            let target = if raw.bluetooth {
                let channel = match raw.channel {
                    Some(channel) => Some(Channel::new(parse_number(&channel)?)?),
                    None => None,
                };
                Target::Wireless {
                    address: value.parse()?,
                    channel,
                }
            } else {
                if raw.channel.is_some() {
                    return Err(CliError::UnexpectedChannel);
                }
                parse_datagram_target(&value)?
            };
            Mode::Recorder(target)
        }
    };

    Ok(Command::Run(Options { mode, config_path }))
}

fn collect(mut args: impl Iterator<Item = String>) -> Result<RawArgs, CliError> {
    let mut raw = RawArgs::default();

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "-h" | "--help" => {
                raw.help = true;
                continue;
            }
            "-l" | "--list-devices" => {
                raw.list_devices = true;
                continue;
            }
            "-b" | "--bluetooth" => {
                raw.bluetooth = true;
                continue;
            }
            "-p" | "--player" => &mut raw.player,
            "-r" | "--recorder" => &mut raw.recorder,
            "--channel" => &mut raw.channel,
            "-c" | "--config" => &mut raw.config,
            _ => return Err(CliError::UnknownOption(arg)),
        };

        if slot.is_some() {
            return Err(CliError::Repeated(arg));
        }
        match args.next() {
            Some(value) => *slot = Some(value),
            None => return Err(CliError::MissingValue(arg)),
        }
    }

    Ok(raw)
}

fn parse_number(value: &str) -> Result<u32, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidNumber(value.to_string()))
}

/// `IP:PORT`, with IPv6 hosts in brackets
fn parse_datagram_target(value: &str) -> Result<Target, CliError> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(Target::Datagram {
            ip: addr.ip(),
            port: Port::new(addr.port() as u32)?,
        });
    }

    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| CliError::InvalidTarget(value.to_string()))?;

    let port = Port::new(parse_number(port)?)?;
    let ip = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map_err(|_| TransportError::InvalidAddress(host.to_string()))?;

    Ok(Target::Datagram { ip, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Result<Options, CliError> {
        match parse(args.iter().copied())? {
            Command::Run(options) => Ok(options),
            other => panic!("expected a run command, got {:?}", other),
        }
    }

    #[test]
    fn test_player_port() {
        let options = run(&["-p", "5000"]).unwrap();
        assert_eq!(
            options.mode,
            Mode::Player(Listen::Datagram {
                port: Port::new(5000).unwrap()
            })
        );
        assert_eq!(options.config_path, None);
    }

    #[test]
    fn test_recorder_target() {
        let options = run(&["--recorder", "192.168.1.20:7000", "-c", "stream.toml"]).unwrap();
        assert_eq!(
            options.mode,
            Mode::Recorder(Target::Datagram {
                ip: "192.168.1.20".parse().unwrap(),
                port: Port::new(7000).unwrap(),
            })
        );
        assert_eq!(options.config_path, Some(PathBuf::from("stream.toml")));
    }

    #[test]
    fn test_ipv6_target() {
        let options = run(&["-r", "[::1]:7000"]).unwrap();
        assert!(matches!(
            options.mode,
            Mode::Recorder(Target::Datagram { ip: IpAddr::V6(_), .. })
        ));
    }

    #[test]
    fn test_help_wins() {
        assert_eq!(parse(["-p", "5000", "-h"]).unwrap(), Command::Help);
        assert_eq!(parse(["--help"]).unwrap(), Command::Help);
    }

    #[test]
    fn test_mode_exclusivity() {
        assert!(matches!(
            parse(["-p", "5000", "-r", "127.0.0.1:5000"]),
            Err(CliError::BothModes)
        ));
        assert!(matches!(parse(Vec::<String>::new()), Err(CliError::NoMode)));
    }

    #[test]
    fn test_invalid_ports() {
        assert!(matches!(
            parse(["-p", "0"]),
            Err(CliError::Transport(TransportError::InvalidPort(0)))
        ));
        assert!(matches!(
            parse(["-r", "127.0.0.1:70000"]),
            Err(CliError::Transport(TransportError::InvalidPort(70000)))
        ));
        assert!(matches!(parse(["-p", "abc"]), Err(CliError::InvalidNumber(_))));
    }

    #[test]
    fn test_invalid_targets() {
        assert!(matches!(parse(["-r", "127.0.0.1"]), Err(CliError::InvalidTarget(_))));
        assert!(matches!(
            parse(["-r", "300.0.0.1:5000"]),
            Err(CliError::Transport(TransportError::InvalidAddress(_)))
        ));
    }

    #[test]
    fn test_malformed_arguments() {
        assert!(matches!(parse(["-p"]), Err(CliError::MissingValue(_))));
        assert!(matches!(parse(["--bogus"]), Err(CliError::UnknownOption(_))));
        assert!(matches!(parse(["-p", "1", "-p", "2"]), Err(CliError::Repeated(_))));
    }

    #[test]
    fn test_bluetooth_modes() {
        let options = run(&["-b", "-r", "00:1A:7D:DA:71:13", "--channel", "3"]).unwrap();
        assert_eq!(
            options.mode,
            Mode::Recorder(Target::Wireless {
                address: "00:1A:7D:DA:71:13".parse().unwrap(),
                channel: Some(Channel::new(3).unwrap()),
            })
        );

        let options = run(&["--bluetooth", "-p", "4"]).unwrap();
        assert_eq!(
            options.mode,
            Mode::Player(Listen::Wireless {
                channel: Channel::new(4).unwrap()
            })
        );
    }

    #[test]
    fn test_bluetooth_validation() {
        assert!(matches!(
            parse(["-b", "-r", "00:1A:7D:DA:71"]),
            Err(CliError::Transport(TransportError::InvalidHardwareAddress(_)))
        ));
        assert!(matches!(
            parse(["-b", "-p", "31"]),
            Err(CliError::Transport(TransportError::InvalidChannel(31)))
        ));
        assert!(matches!(
            parse(["-r", "127.0.0.1:5000", "--channel", "2"]),
            Err(CliError::UnexpectedChannel)
        ));
    }

    #[test]
    fn test_list_devices() {
        assert_eq!(
            parse(["-l", "-c", "a.toml"]).unwrap(),
            Command::ListDevices {
                config_path: Some(PathBuf::from("a.toml"))
            }
        );
    }
}
