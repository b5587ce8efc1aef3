//! # vmprotect-probe
//!
//! Command-line front end to the SDK bindings: reads the environment probes,
//! the hardware ID and the licensing state, and drives activation requests.
//! Built with `--features cli`; with `stand-in` as well it talks to the
//! stand-in instead of the SDK.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vmprotect::config;
use vmprotect::protector::{activation, environment, hardware_id, licensing, ActivationReply};

#[derive(Parser, Debug)]
#[command(name = "vmprotect-probe", version, about, long_about = None)]
struct Cli {
    /// Verbosity; repeat for more (-v, -vv, -vvv). RUST_LOG overrides it.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every environment probe once.
    Report,

    /// Print the hardware ID of this machine.
    Hwid,

    /// Install a serial and print its state and descriptor.
    Serial {
        serial: String,
    },

    /// Print the state of the installed serial.
    State,

    /// Activate online with an activation code and print the serial.
    Activate {
        code: String,
    },

    /// Deactivate a serial online.
    Deactivate {
        serial: String,
    },

    /// Print the blob for offline activation.
    OfflineActivate {
        code: String,
    },

    /// Print the blob for offline deactivation.
    OfflineDeactivate {
        serial: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    log::debug!("vmprotect-probe starting, backend {}", config::backend_name());

    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Exit code 0 when the request succeeded, 1 when the SDK said no.
fn run(command: Commands) -> anyhow::Result<u8> {
    match command {
        Commands::Report => {
            let report = environment::report();
            println!("backend:          {}", config::backend_name());
            println!("protected:        {}", report.protected);
            println!("debugger:         {}", report.debugger);
            println!("kernel debugger:  {}", report.kernel_debugger);
            println!("virtual machine:  {}", report.virtual_machine);
            println!("image crc valid:  {}", report.image_crc_valid);
            Ok(u8::from(report.is_hostile()))
        }
        Commands::Hwid => {
            println!("{}", hardware_id::current_hwid());
            Ok(0)
        }
        Commands::Serial { serial } => {
            let state = licensing::set_serial_number(&serial).context("installing serial")?;
            print_state(state);
            match licensing::serial_number_data() {
                Some(data) => {
                    println!("user:        {}", data.user_name);
                    println!("e-mail:      {}", data.email);
                    if data.expire_date.is_set() {
                        println!("expires:     {}", data.expire_date);
                    }
                    if data.max_build_date.is_set() {
                        println!("max build:   {}", data.max_build_date);
                    }
                    if data.running_time > 0 {
                        println!("running time: {} min", data.running_time);
                    }
                    if !data.user_data.is_empty() {
                        println!("user data:   {} bytes", data.user_data.len());
                    }
                }
                None => println!("no serial data available"),
            }
            Ok(u8::from(!state.is_valid()))
        }
        Commands::State => {
            let state = licensing::serial_number_state();
            print_state(state);
            Ok(u8::from(!state.is_valid()))
        }
        Commands::Activate { code } => {
            let reply = activation::activate_license(&code).context("online activation")?;
            print_reply(reply)
        }
        Commands::Deactivate { serial } => {
            let status = activation::deactivate_license(&serial).context("online deactivation")?;
            println!("{}", status);
            Ok(u8::from(!status.is_ok()))
        }
        Commands::OfflineActivate { code } => {
            let reply = activation::offline_activation_string(&code).context("offline activation")?;
            print_reply(reply)
        }
        Commands::OfflineDeactivate { serial } => {
            let reply = activation::offline_deactivation_string(&serial).context("offline deactivation")?;
            print_reply(reply)
        }
    }
}

fn print_state(state: licensing::SerialState) {
    if state.is_valid() {
        println!("serial state: valid");
        return;
    }
    println!("serial state: 0x{:02x}", state.bits());
    for reason in state.reasons() {
        println!("  - {}", reason);
    }
}

fn print_reply(reply: ActivationReply) -> anyhow::Result<u8> {
    match reply {
        ActivationReply::Granted(payload) => {
            println!("{}", payload);
            Ok(0)
        }
        ActivationReply::Denied(status) => {
            eprintln!("denied ({}): {}", status.code(), status);
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_serial() {
        let cli = Cli::try_parse_from(["vmprotect-probe", "serial", "ABCD-1234"]).unwrap();
        match cli.command {
            Commands::Serial { serial } => assert_eq!(serial, "ABCD-1234"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_parse_offline_activate_with_verbosity() {
        let cli = Cli::try_parse_from(["vmprotect-probe", "-vv", "offline-activate", "CODE"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::OfflineActivate { .. }));
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["vmprotect-probe"]).is_err());
    }

    #[cfg(vmprotect_stand_in)]
    #[test]
    fn run_reports_denied_activation() {
        vmprotect::protector::stand_in::reset();
        let code = run(Commands::Activate { code: "UNSCRIPTED".to_string() }).unwrap();
        assert_eq!(code, 1);
    }

    #[cfg(vmprotect_stand_in)]
    #[test]
    fn run_rejects_serial_with_nul() {
        vmprotect::protector::stand_in::reset();
        assert!(run(Commands::Serial { serial: "A\0B".to_string() }).is_err());
    }
}
