//! `authgate-jwtgen` binary: prints an `Authorization` header for a service.

use std::process::ExitCode;

use authgate_server::{cli::JwtgenArgs, issue};
use clap::Parser;

fn main() -> ExitCode {
    let args = JwtgenArgs::parse();
    match issue::issue_token_from_file(&args.private_key, &args.subject, args.max_age, &args.issuer) {
        Ok(token) => {
            println!("Authorization: Bearer {token}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("authgate-jwtgen: {e}");
            ExitCode::FAILURE
        },
    }
}
