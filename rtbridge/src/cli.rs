//! Command-line surface, built with `clap`'s `App`/`Arg` builder API in
//! the style of `symphonia-play`'s CLI.

use std::path::PathBuf;

use clap::{App, Arg};

#[derive(Debug)]
pub struct Cli {
    pub decoder: PathBuf,
    pub decoder_args: Vec<String>,
    pub config: Option<PathBuf>,
    pub mtu: Option<u32>,
    pub ring_capacity: usize,
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = App::new("rtbridge")
            .about("Real-time audio bridge: decoder subprocess -> sink")
            .arg(
                Arg::with_name("decoder")
                    .long("decoder")
                    .value_name("PATH")
                    .help("Path to the upstream decoder executable")
                    .takes_value(true)
                    .required(true),
            )
            .arg(
                Arg::with_name("decoder-arg")
                    .long("decoder-arg")
                    .value_name("ARG")
                    .help("An argument passed through to the decoder subprocess (repeatable)")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1),
            )
            .arg(
                Arg::with_name("config")
                    .long("config")
                    .value_name("PATH")
                    .help("JSON config file (BridgeConfig/SinkConfig); CLI flags take precedence")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("mtu")
                    .long("mtu")
                    .value_name("BYTES")
                    .help("Overrides the MTU the controller would otherwise measure")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("ring-capacity")
                    .long("ring-capacity")
                    .value_name("BYTES")
                    .help("Ring buffer capacity in bytes")
                    .takes_value(true)
                    .default_value("1048576"),
            )
            .arg(
                Arg::with_name("log-filter")
                    .long("log-filter")
                    .value_name("DIRECTIVE")
                    .help("tracing-subscriber filter directive, overrides RUST_LOG")
                    .takes_value(true),
            )
            .get_matches_from(args);

        Cli {
            decoder: PathBuf::from(matches.value_of("decoder").expect("decoder is required")),
            decoder_args: matches
                .values_of("decoder-arg")
                .map(|vals| vals.map(String::from).collect())
                .unwrap_or_default(),
            config: matches.value_of("config").map(PathBuf::from),
            mtu: matches.value_of("mtu").and_then(|v| v.parse().ok()),
            ring_capacity: matches
                .value_of("ring-capacity")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1 << 20),
            log_filter: matches.value_of("log-filter").map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_decoder_is_given() {
        let cli = Cli::parse_from(["rtbridge", "--decoder", "/usr/bin/flac-decode"]);
        assert_eq!(cli.decoder, PathBuf::from("/usr/bin/flac-decode"));
        assert!(cli.decoder_args.is_empty());
        assert_eq!(cli.ring_capacity, 1 << 20);
        assert!(cli.mtu.is_none());
    }

    #[test]
    fn repeated_decoder_arg_collects_in_order() {
        let cli = Cli::parse_from([
            "rtbridge",
            "--decoder",
            "/usr/bin/flac-decode",
            "--decoder-arg",
            "--raw",
            "--decoder-arg",
            "-",
        ]);
        assert_eq!(cli.decoder_args, vec!["--raw", "-"]);
    }

    #[test]
    fn mtu_and_ring_capacity_parse_as_integers() {
        let cli = Cli::parse_from([
            "rtbridge",
            "--decoder",
            "/usr/bin/flac-decode",
            "--mtu",
            "9000",
            "--ring-capacity",
            "2097152",
        ]);
        assert_eq!(cli.mtu, Some(9000));
        assert_eq!(cli.ring_capacity, 2_097_152);
    }
}
