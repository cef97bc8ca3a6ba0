//! Background process management for `server start|stop|status`.

#[cfg(unix)]
use daemonize::Daemonize;
use std::env;
use std::fs;
use std::path::PathBuf;
use sysinfo::{Pid, System};

use crate::config::project_dirs;

/// Pid file recording the background server process.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn locate() -> anyhow::Result<Self> {
        let dirs = project_dirs()?;
        let data_dir = dirs.data_local_dir();
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join("server.pid"),
        })
    }

    fn read_pid(&self) -> anyhow::Result<Option<u32>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let pid = fs::read_to_string(&self.path)?.trim().parse()?;
        Ok(Some(pid))
    }

    /// Pid of the recorded process, if it is still alive.
    fn running_pid(&self) -> anyhow::Result<Option<u32>> {
        let Some(pid) = self.read_pid()? else {
            return Ok(None);
        };
        let system = System::new_all();
        Ok(system.process(Pid::from_u32(pid)).map(|_| pid))
    }
}

/// Starts the server as a background process.
pub fn start_server() -> anyhow::Result<()> {
    let pid_file = PidFile::locate()?;
    if let Some(pid) = pid_file.running_pid()? {
        println!("Server is already running with PID: {}", pid);
        return Ok(());
    }

    println!("Starting server in the background. PID file at: {}", pid_file.path.display());

    #[cfg(unix)]
    {
        // The parent exits inside `start`; only the daemon returns here.
        Daemonize::new()
            .pid_file(&pid_file.path)
            .working_directory(env::current_dir()?)
            .start()
            .map_err(|e| anyhow::anyhow!("Failed to daemonize: {}", e))?;
        crate::block_on(crate::run_server())?;
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;

        let child = std::process::Command::new(env::current_exe()?)
            .arg("server")
            .arg("run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;
        fs::write(&pid_file.path, child.id().to_string())?;
    }

    Ok(())
}

/// Stops the background server process and removes its pid file.
pub fn stop_server() -> anyhow::Result<()> {
    let pid_file = PidFile::locate()?;
    let Some(pid) = pid_file.read_pid()? else {
        println!("Server is not running (no PID file).");
        return Ok(());
    };

    let system = System::new_all();
    match system.process(Pid::from_u32(pid)) {
        Some(process) => {
            println!("Stopping server process with PID: {}", pid);
            process.kill();
        }
        None => println!("Process with PID {} not found. It may have already stopped.", pid),
    }
    fs::remove_file(&pid_file.path)?;
    println!("Server stopped.");
    Ok(())
}

pub fn check_status() -> anyhow::Result<()> {
    match PidFile::locate()?.running_pid()? {
        Some(pid) => println!("Server is running with PID: {}", pid),
        None => println!("Server is not running."),
    }
    Ok(())
}
