// GUI-subsystem binary on Windows release builds: no console window for the GUI.
// CLI mode (--input/-i present) attaches to the launching terminal instead.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cvisiontool::app::CVisionApp;
use cvisiontool::{cli, log_err, log_info, logger};
use eframe::egui;

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        #[cfg(target_os = "windows")]
        attach_parent_console();
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------
    logger::init();

    // Any plain argument is treated as an image to open at startup.
    let startup_files: Vec<PathBuf> = std::env::args()
        .skip(1)
        .filter(|a| !a.starts_with('-'))
        .map(PathBuf::from)
        .collect();
    log_info!("Starting GUI with {} startup file(s)", startup_files.len());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0])
            .with_drag_and_drop(true)
            .with_title("CVisionTool"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "CVisionTool",
        options,
        Box::new(move |cc| Box::new(CVisionApp::new(cc, startup_files))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Route println!/eprintln! to the terminal that launched a GUI-subsystem build.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    // SAFETY: plain Win32 call with a constant argument; failure is harmless.
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
