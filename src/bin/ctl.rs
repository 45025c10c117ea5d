use clap::Parser;
use std::process::ExitCode;

use holdtotalk::control::{send_command, Command, SOCKET_NAME};

/// Operator CLI for the holdtotalk daemon control socket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// `status`, `stop`, `models`, `model <name>`, `continuous on|off`,
    /// `mic-warm on|off`, or `reload`.
    #[arg(num_args = 1..)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let Some(command) = Command::parse(&args.command) else {
        eprintln!("error: unrecognized command: {}", args.command.join(" "));
        return ExitCode::from(1);
    };

    match send_command(SOCKET_NAME, command) {
        Ok(response) => {
            println!("{}", response.display());
            ExitCode::from(response.exit_code() as u8)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
