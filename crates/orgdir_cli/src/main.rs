//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `orgdir_core` linkage.
//! - Confirm the configured database opens and migrates.

use std::process::ExitCode;

fn main() -> ExitCode {
    println!("orgdir_core ping={}", orgdir_core::ping());
    println!("orgdir_core version={}", orgdir_core::core_version());

    let config = match orgdir_core::DirectoryConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("orgdir config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("orgdir db_path={}", config.db_path.display());

    let conn = match config.open() {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("orgdir open error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0)) {
        Ok(version) => {
            println!("orgdir schema_version={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("orgdir schema probe error: {err}");
            ExitCode::FAILURE
        }
    }
}
