use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument at all prints usage and exits.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_usage();
    }
    has_cli_args
}

fn display_usage() {
    println!("\n{}\n", include_str!("./cli-help.txt"));
    // Only non-secret variables are echoed back
    const DISPLAY_ENVS: [&str; 7] = [
        "RUST_LOG",
        "CM_HOST",
        "CM_PORT",
        "CM_DATABASE_URL",
        "CM_OTP_TTL_SECONDS",
        "CM_ABANDONMENT_SECONDS",
        "CM_SWEEP_INTERVAL_SECONDS",
    ];
    println!("Current environment values:");
    for name in DISPLAY_ENVS {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<30} {val}");
    }
}
