use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

/// An external ledger viewer (Fava by default), located once at startup.
#[derive(Debug, Clone)]
pub struct ViewerCapability {
    program: String,
    path: Option<PathBuf>,
}

fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

impl ViewerCapability {
    pub fn detect(program: &str) -> ViewerCapability {
        let path = find_program(program);
        match &path {
            Some(path) => debug!("viewer {} found at {}", program, path.display()),
            None => debug!("viewer {} not found", program),
        }

        ViewerCapability {
            program: program.to_string(),
            path,
        }
    }

    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }

    /// Runs the viewer on `ledger` and waits for it to exit. Without a viewer
    /// this only logs a warning.
    pub fn serve(&self, ledger: &Path) -> io::Result<()> {
        let Some(path) = &self.path else {
            warn!(
                "unable to find {}, will not start a viewer for {}",
                self.program,
                ledger.display()
            );
            return Ok(());
        };

        info!("starting {} on {}", self.program, ledger.display());
        let status = Command::new(path).arg(ledger).status()?;
        if !status.success() {
            warn!("{} exited with {}", self.program, status);
        }

        Ok(())
    }
}
